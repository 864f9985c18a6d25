use criterion::{black_box, criterion_group, criterion_main, Criterion};

use recap_core::grading::{grade_submission, is_correct, practice_feedback, GradedItem};
use recap_core::hints::levenshtein;
use recap_core::model::{Answer, Choice, InputMethod, Question, QuestionType};

fn make_question(id: u64, question_type: QuestionType) -> Question {
    let choices = (1..=4)
        .map(|n| Choice {
            id: n,
            label: (b'A' + (n - 1) as u8) as char,
            text: format!("choice {n}"),
            is_correct: n == 2 || (question_type == QuestionType::Multi && n == 4),
            explanation: String::new(),
        })
        .collect();
    Question {
        id,
        domain: format!("Domain {}", id % 4),
        question_type,
        text: format!("question {id}"),
        explanation: String::new(),
        image_url: None,
        code_block: None,
        input_method: InputMethod::Text,
        choices: if question_type.is_choice_based() {
            choices
        } else {
            Vec::new()
        },
        acceptable_answers: vec!["kubectl get pods".into(), "kubectl get po".into()],
        bank_version: "1.0.0".into(),
        validity_score: None,
        flagged: false,
    }
}

fn bench_is_correct(c: &mut Criterion) {
    let mut group = c.benchmark_group("is_correct");

    let single = make_question(1, QuestionType::Single);
    let multi = make_question(2, QuestionType::Multi);
    let fill = make_question(3, QuestionType::FillBlank);

    group.bench_function("single", |b| {
        let answer = Answer::choices([2]);
        b.iter(|| is_correct(black_box(&single), black_box(&answer)))
    });
    group.bench_function("multi", |b| {
        let answer = Answer::choices([4, 2]);
        b.iter(|| is_correct(black_box(&multi), black_box(&answer)))
    });
    group.bench_function("fillblank", |b| {
        let answer = Answer::text("  Kubectl Get Pods ");
        b.iter(|| is_correct(black_box(&fill), black_box(&answer)))
    });
    group.bench_function("practice feedback with hint", |b| {
        let answer = Answer::text("kubectl get pod");
        b.iter(|| practice_feedback(black_box(&fill), black_box(&answer)))
    });

    group.finish();
}

fn bench_submission(c: &mut Criterion) {
    let types = [
        QuestionType::Single,
        QuestionType::Multi,
        QuestionType::TrueFalse,
        QuestionType::FillBlank,
    ];
    let questions: Vec<Question> = (0..100)
        .map(|i| make_question(i, types[i as usize % 4]))
        .collect();
    let answers: Vec<Option<Answer>> = (0..100)
        .map(|i| match i % 5 {
            0 => None,
            1 => Some(Answer::choices([2])),
            2 => Some(Answer::choices([2, 4])),
            3 => Some(Answer::text("kubectl get po")),
            _ => Some(Answer::choices([1])),
        })
        .collect();

    c.bench_function("grade 100-question submission", |b| {
        b.iter(|| {
            let items = questions
                .iter()
                .zip(&answers)
                .enumerate()
                .map(|(i, (q, a))| GradedItem {
                    exam_question_id: i as u64,
                    question: q,
                    answer: a.as_ref(),
                });
            grade_submission(black_box(items), 70.0)
        })
    });
}

fn bench_levenshtein(c: &mut Criterion) {
    c.bench_function("levenshtein short", |b| {
        b.iter(|| levenshtein(black_box("kubectl get pods"), black_box("kubectl get pod")))
    });
}

criterion_group!(benches, bench_is_correct, bench_submission, bench_levenshtein);
criterion_main!(benches);
