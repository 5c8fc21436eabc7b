mod test_support;

use serde_json::{json, Value};
use test_support::{add_student, class_params, seed_cs3500, with, Session};

fn assign1() -> Value {
    with(
        class_params("CS", 3500, "Fall", 2024),
        json!({ "category": "Assignments", "asgname": "assign1" }),
    )
}

fn setup(s: &mut Session) -> String {
    seed_cs3500(s);
    let stud = add_student(s, "Ada");
    let class = class_params("CS", 3500, "Fall", 2024);
    s.ok("enrollment.enroll", with(class.clone(), json!({ "uid": stud })));
    s.ok("categories.create", with(class.clone(), json!({ "category": "Assignments", "weight": 75 })));
    s.ok(
        "assignments.create",
        with(
            class,
            json!({
                "category": "Assignments", "asgname": "assign1", "points": 42,
                "due": "2024-09-30 23:59:00", "contents": "build a spreadsheet"
            }),
        ),
    );
    stud
}

#[test]
fn resubmission_replaces_contents_and_keeps_score() {
    let mut s = Session::open("lmsd-submit-upsert");
    let stud = setup(&mut s);

    let first = s.ok("submissions.submit", with(assign1(), json!({ "uid": stud, "contents": "v1" })));
    assert_eq!(first["outcome"], "created");
    s.ok("submissions.grade", with(assign1(), json!({ "uid": stud, "score": 30 })));

    let second = s.ok("submissions.submit", with(assign1(), json!({ "uid": stud, "contents": "v2" })));
    assert_eq!(second["outcome"], "replaced");

    let text = s.ok("submissions.text", with(assign1(), json!({ "uid": stud })));
    assert_eq!(text["contents"], "v2");

    let subs = s.ok("submissions.list", assign1());
    let rows = subs["submissions"].as_array().expect("rows");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["score"], 30);
    assert_eq!(rows[0]["uid"], stud.as_str());

    let contents = s.ok("assignments.contents", assign1());
    assert_eq!(contents["contents"], "build a spreadsheet");

    let listed = s.ok("assignments.list", class_params("CS", 3500, "Fall", 2024));
    assert_eq!(listed["assignments"][0]["submissions"], 1);
    assert_eq!(listed["assignments"][0]["due"], "2024-09-30 23:59:00");
}

#[test]
fn submitting_to_unknown_targets_is_not_found() {
    let mut s = Session::open("lmsd-submit-missing");
    let stud = setup(&mut s);
    let missing = with(
        class_params("CS", 3500, "Fall", 2024),
        json!({ "category": "Assignments", "asgname": "assign9", "uid": stud, "contents": "x" }),
    );
    let (code, _) = s.err("submissions.submit", missing);
    assert_eq!(code, "not_found");

    let (code, _) = s.err(
        "submissions.submit",
        with(assign1(), json!({ "uid": "u0999999", "contents": "x" })),
    );
    assert_eq!(code, "not_found");
}
