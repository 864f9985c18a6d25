//! End-to-end pipeline over the library crates:
//! load bank -> ingest -> exams -> sessions -> submit -> validity.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;

use recap_core::engine::{generate_exams, index_questions, GenerationEngine};
use recap_core::grading;
use recap_core::model::{Answer, AttemptMode, QuestionType};
use recap_core::parser;
use recap_core::selector::ReuseScope;
use recap_core::session::ExamSessions;
use recap_core::traits::ExamStore;
use recap_core::validity::ValidityRun;
use recap_jobs::{Job, ValidityJob};
use recap_store::JsonStore;

fn sample_course() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../courses/linux-101")
}

#[test]
fn sample_bank_plans_two_full_exams() {
    let loaded = parser::load_course_dir(&sample_course()).unwrap();
    assert!(loaded.warnings.is_empty(), "{:?}", loaded.warnings);
    let bank = loaded.bank.with_sequential_ids();

    let out = generate_exams(&bank.course, &bank.metadata, &bank.questions, ReuseScope::PerExam)
        .unwrap();
    assert_eq!(out.plan.target_size, 7);
    assert_eq!(out.plan.questions_per_exam, 7);
    assert_eq!(out.plan.num_exams, 2);
    assert_eq!(out.plan.unused_questions, 0);
    assert_eq!(out.plan.per_domain_quota["Filesystem"], 3);
    assert_eq!(out.plan.per_domain_quota["Processes"], 2);
    assert_eq!(out.plan.per_domain_quota["Networking"], 2);
}

#[test]
fn per_batch_sample_uses_every_question_once() {
    let bank = parser::load_course_dir(&sample_course())
        .unwrap()
        .bank
        .with_sequential_ids();
    let out = generate_exams(&bank.course, &bank.metadata, &bank.questions, ReuseScope::PerBatch)
        .unwrap();

    let mut seen = BTreeSet::new();
    for draft in &out.drafts {
        for q in &draft.questions {
            assert!(seen.insert(q.question_id));
        }
    }
    assert_eq!(seen.len(), 14);
}

#[tokio::test]
async fn full_pipeline_with_json_store() {
    let data = tempfile::tempdir().unwrap();
    let path = data.path().join("store.json");
    let store: Arc<dyn ExamStore> = Arc::new(JsonStore::open(&path).await.unwrap());

    let bank = parser::load_course_dir(&sample_course()).unwrap().bank;
    let engine = GenerationEngine::new(Arc::clone(&store), ReuseScope::PerExam);
    let report = engine.ingest(bank).await.unwrap();
    assert_eq!(report.exams.len(), 2);

    let questions = index_questions(store.questions("linux-101").await.unwrap());
    let sessions = ExamSessions::new(Arc::clone(&store));
    let exam = &report.exams[0];

    // Twelve takers: the first three answer nothing correctly, the rest
    // answer everything correctly.
    for t in 0..12 {
        let taker = format!("taker{t}@example.com");
        let started = sessions
            .start(exam.id, &taker, AttemptMode::Simulation, Utc::now())
            .await
            .unwrap();
        for sq in &started.questions {
            let q = &questions[&sq.question_id];
            let answer = if t < 3 {
                match q.question_type {
                    QuestionType::FillBlank => Answer::text("no idea"),
                    _ => Answer::choices(
                        q.choices.iter().filter(|c| !c.is_correct).map(|c| c.id).take(1),
                    ),
                }
            } else {
                match q.question_type {
                    QuestionType::FillBlank => Answer::text(q.acceptable_answers[0].to_uppercase()),
                    _ => Answer::choices(q.correct_choice_ids()),
                }
            };
            sessions
                .record_answer(started.attempt.id, &taker, sq.exam_question_id, answer)
                .await
                .unwrap();
        }
        let result = sessions
            .submit(started.attempt.id, &taker, Utc::now())
            .await
            .unwrap();
        if t < 3 {
            assert_eq!(result.score_percent, 0);
            assert!(!result.pass);
            assert!(result.domain_breakdown.values().all(|s| *s == 0));
        } else {
            assert_eq!(result.score_percent, 100);
            assert!(result.pass);
            assert_eq!(result.domain_breakdown.len(), 3);
        }
    }

    let job = ValidityJob::new(Arc::clone(&store), 0.25);
    let summary = job.run().await.unwrap();
    assert_eq!(summary.processed, 7);

    // Reopen from disk: everything above survived.
    drop(sessions);
    drop(engine);
    drop(job);
    drop(store);
    let reopened = JsonStore::open(&path).await.unwrap();
    let stored = reopened.questions("linux-101").await.unwrap();
    let in_exam: BTreeSet<u64> = exam.questions.iter().map(|q| q.question_id).collect();
    for q in &stored {
        if in_exam.contains(&q.id) {
            assert_eq!(q.validity_score, Some(1.0));
        } else {
            assert_eq!(q.validity_score, None);
        }
    }
    assert_eq!(reopened.completed_attempts().await.unwrap().len(), 12);

    let rerun = ValidityJob::new(Arc::new(reopened), 0.25).score().await.unwrap();
    assert!(matches!(rerun, ValidityRun::Computed { low_group: 3, high_group: 9, .. }));
}

#[test]
fn grading_rules_on_sample_questions() {
    let bank = parser::load_course_dir(&sample_course())
        .unwrap()
        .bank
        .with_sequential_ids();
    let multi = bank
        .questions
        .iter()
        .find(|q| q.question_type == QuestionType::Multi)
        .unwrap();
    let correct = multi.correct_choice_ids();
    assert!(grading::is_correct(multi, &Answer::choices(correct.clone())));
    assert!(!grading::is_correct(multi, &Answer::choices(correct[..1].to_vec())));

    let terminal = bank
        .questions
        .iter()
        .find(|q| q.text.contains("long format"))
        .unwrap();
    let feedback = grading::practice_feedback(terminal, &Answer::text("ls -a"));
    assert!(!feedback.correct);
    assert!(feedback.hint.unwrap().contains("ls -l"));
}
