//! Exam-bank loader.
//!
//! A course directory holds `course.yaml` and `exam_bank.csv`. The CSV starts
//! with metadata rows (`key,value`), may carry a header row, and continues
//! with one 26-column row per question. Every problem found is collected into
//! a [`BankError`]; a bank with any issue is rejected as a whole.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::error::{BankError, BankIssue};
use crate::model::{BankMetadata, Choice, Course, InputMethod, Question, QuestionBank, QuestionType};
use crate::planner;
use crate::weights::DomainWeights;

pub const COURSE_FILE: &str = "course.yaml";
pub const BANK_FILE: &str = "exam_bank.csv";

/// Bank version used when `schema_version` is absent or empty.
pub const DEFAULT_BANK_VERSION: &str = "1.0.0";

/// Columns in a question row.
pub const QUESTION_COLUMNS: usize = 26;

const MAX_CHOICES: usize = 6;
const CHOICE_START: usize = 7;
const ACCEPTABLE_ANSWERS: usize = 25;

const COLUMN_NAMES: [&str; 7] = [
    "question_type",
    "domain",
    "question_text",
    "explanation",
    "image_url",
    "code_block",
    "input_method",
];

const METADATA_KEYS: [&str; 6] = [
    "schema_version",
    "min_questions",
    "max_questions",
    "exam_time",
    "passing_score",
    "domains",
];

#[derive(Debug, Deserialize)]
struct CourseFile {
    marketing_name: String,
    course_code: String,
    #[serde(default)]
    duration_days: u32,
    #[serde(default)]
    responsibility: String,
}

/// A bank that passed validation, with its non-fatal warnings.
#[derive(Debug, Clone)]
pub struct LoadedBank {
    pub bank: QuestionBank,
    pub warnings: Vec<BankIssue>,
}

/// Metadata and questions parsed from `exam_bank.csv`.
#[derive(Debug, Clone)]
pub struct ParsedBank {
    pub metadata: BankMetadata,
    pub questions: Vec<Question>,
    pub warnings: Vec<BankIssue>,
}

/// List course directories (those containing `course.yaml`), sorted by name.
pub fn discover_courses(courses_dir: &Path) -> Result<Vec<PathBuf>> {
    if !courses_dir.is_dir() {
        anyhow::bail!("not a directory: {}", courses_dir.display());
    }

    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(courses_dir)
        .with_context(|| format!("failed to read directory: {}", courses_dir.display()))?
    {
        let path = entry?.path();
        if path.is_dir() && path.join(COURSE_FILE).is_file() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// SHA-256 over both bank files, hex encoded.
pub fn fingerprint(course_yaml: &[u8], exam_bank: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update((course_yaml.len() as u64).to_be_bytes());
    hasher.update(course_yaml);
    hasher.update(exam_bank);
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Fingerprint a course directory without parsing it.
pub fn course_fingerprint(dir: &Path) -> Result<String> {
    let (course_yaml, exam_bank) = read_course_files(dir)?;
    Ok(fingerprint(&course_yaml, &exam_bank))
}

fn read_course_files(dir: &Path) -> Result<(Vec<u8>, Vec<u8>)> {
    let course_path = dir.join(COURSE_FILE);
    let bank_path = dir.join(BANK_FILE);
    let course_yaml = std::fs::read(&course_path)
        .with_context(|| format!("failed to read {}", course_path.display()))?;
    let exam_bank = std::fs::read(&bank_path)
        .with_context(|| format!("failed to read {}", bank_path.display()))?;
    Ok((course_yaml, exam_bank))
}

/// Load and validate a course directory.
///
/// I/O failures are plain errors; content problems come back as a
/// [`BankError`] inside the `anyhow::Error`.
pub fn load_course_dir(dir: &Path) -> Result<LoadedBank> {
    let dir_name = dir
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("course directory has no usable name: {}", dir.display()))?
        .to_string();

    let (course_yaml, exam_bank) = read_course_files(dir)?;
    let fingerprint = fingerprint(&course_yaml, &exam_bank);

    let course = parse_course_yaml(&dir_name, &String::from_utf8_lossy(&course_yaml))?;
    let parsed = parse_exam_bank(&course.code, &String::from_utf8_lossy(&exam_bank))?;

    let bank = QuestionBank {
        course,
        metadata: parsed.metadata,
        questions: parsed.questions,
        fingerprint,
    };
    let mut warnings = parsed.warnings;
    warnings.extend(validate_bank(&bank));

    for w in &warnings {
        tracing::warn!(course = %bank.course.code, "{w}");
    }
    Ok(LoadedBank { bank, warnings })
}

/// Parse `course.yaml`; `course_code` must equal the directory name.
pub fn parse_course_yaml(dir_name: &str, content: &str) -> Result<Course, BankError> {
    let reject = |issue: BankIssue| BankError {
        course: dir_name.to_string(),
        issues: vec![issue],
    };

    let file: CourseFile = serde_yaml::from_str(content).map_err(|e| {
        reject(
            BankIssue::new(None, None, format!("failed to parse {COURSE_FILE}: {e}"))
                .with_fix("ensure the YAML format is correct"),
        )
    })?;

    if file.course_code != dir_name {
        return Err(reject(
            BankIssue::new(
                None,
                Some("course_code"),
                "mismatch between course.yaml and directory name",
            )
            .with_fix(format!(
                "course_code in YAML ({}) must match directory name ({dir_name})",
                file.course_code
            )),
        ));
    }

    Ok(Course {
        code: file.course_code,
        name: file.marketing_name.clone(),
        marketing_name: file.marketing_name,
        duration_days: file.duration_days,
        responsibility: file.responsibility,
    })
}

#[derive(Default)]
struct MetadataRows {
    bank_version: Option<String>,
    min_questions: Option<usize>,
    max_questions: Option<usize>,
    exam_time: Option<u32>,
    passing_score: Option<f64>,
    domains: Option<DomainWeights>,
}

/// Parse the contents of `exam_bank.csv`.
pub fn parse_exam_bank(course_code: &str, content: &str) -> Result<ParsedBank, BankError> {
    let mut issues = Vec::new();
    let mut warnings = Vec::new();
    let mut meta = MetadataRows::default();
    let mut questions = Vec::new();
    let mut seen_texts: HashSet<String> = HashSet::new();
    let mut in_metadata = true;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    for (index, record) in reader.records().enumerate() {
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                let line = e.position().map(|p| p.line() as usize);
                issues.push(BankIssue::new(line, None, format!("unreadable CSV row: {e}")));
                break;
            }
        };
        let line = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(index + 1);
        let first = record.get(0).unwrap_or("");

        if in_metadata && METADATA_KEYS.contains(&first) {
            let value = record.get(1).unwrap_or("");
            parse_metadata_row(first, value, line, &mut meta, &mut issues, &mut warnings);
            continue;
        }
        in_metadata = false;

        if first.eq_ignore_ascii_case("question_type") {
            continue;
        }
        if record.iter().all(str::is_empty) {
            continue;
        }

        let fields: Vec<&str> = record.iter().collect();
        if let Some(q) = parse_question_row(&fields, line, &meta, &mut seen_texts, &mut issues) {
            questions.push(q);
        }
    }

    let metadata = finish_metadata(meta, &mut issues, &mut warnings);

    if questions.is_empty() && issues.is_empty() {
        issues.push(
            BankIssue::new(None, None, "exam bank has no question rows")
                .with_fix("add at least one question row after the metadata rows"),
        );
    }

    match metadata {
        Some(metadata) if issues.is_empty() => {
            for q in &mut questions {
                q.bank_version = metadata.bank_version.clone();
            }
            Ok(ParsedBank {
                metadata,
                questions,
                warnings,
            })
        }
        _ => Err(BankError {
            course: course_code.to_string(),
            issues,
        }),
    }
}

fn parse_metadata_row(
    key: &str,
    value: &str,
    line: usize,
    meta: &mut MetadataRows,
    issues: &mut Vec<BankIssue>,
    warnings: &mut Vec<BankIssue>,
) {
    let positive = |issues: &mut Vec<BankIssue>, what: &str| -> Option<usize> {
        match value.parse::<usize>() {
            Ok(v) if v > 0 => Some(v),
            _ => {
                issues.push(
                    BankIssue::new(Some(line), Some(key), format!("invalid value '{value}'"))
                        .with_fix(format!("must be a positive integer{what}")),
                );
                None
            }
        }
    };

    match key {
        "schema_version" => {
            if value.is_empty() {
                warnings.push(
                    BankIssue::new(Some(line), Some(key), "missing schema_version value")
                        .with_fix(format!("defaulting to {DEFAULT_BANK_VERSION}")),
                );
            } else {
                meta.bank_version = Some(value.to_string());
            }
        }
        "min_questions" => meta.min_questions = positive(issues, ""),
        "max_questions" => meta.max_questions = positive(issues, ""),
        "exam_time" => {
            meta.exam_time = positive(issues, " (minutes)").and_then(|v| u32::try_from(v).ok())
        }
        "passing_score" => match value.parse::<f64>() {
            Ok(v) if (0.0..=100.0).contains(&v) => meta.passing_score = Some(v),
            _ => issues.push(
                BankIssue::new(Some(line), Some(key), format!("invalid value '{value}'"))
                    .with_fix("must be a number between 0 and 100"),
            ),
        },
        "domains" => match DomainWeights::parse(value) {
            Ok(w) => meta.domains = Some(w),
            Err(e) => issues.push(
                BankIssue::new(Some(line), Some(key), format!("invalid domain weights: {e}"))
                    .with_fix("format is 'Name:Weight|Name:Weight' with weights summing to 1.0"),
            ),
        },
        _ => {}
    }
}

fn finish_metadata(
    meta: MetadataRows,
    issues: &mut Vec<BankIssue>,
    warnings: &mut Vec<BankIssue>,
) -> Option<BankMetadata> {
    let bank_version = match meta.bank_version {
        Some(v) => v,
        None => {
            if !warnings.iter().any(|w| w.field.as_deref() == Some("schema_version")) {
                warnings.push(
                    BankIssue::new(None, Some("schema_version"), "no schema_version row")
                        .with_fix(format!("defaulting to {DEFAULT_BANK_VERSION}")),
                );
            }
            DEFAULT_BANK_VERSION.to_string()
        }
    };

    let mut missing = Vec::new();
    if meta.min_questions.is_none() {
        missing.push("min_questions");
    }
    if meta.max_questions.is_none() {
        missing.push("max_questions");
    }
    if meta.exam_time.is_none() {
        missing.push("exam_time");
    }
    if meta.passing_score.is_none() {
        missing.push("passing_score");
    }
    if meta.domains.is_none() {
        missing.push("domains");
    }
    if !missing.is_empty() {
        // Rows that were present but invalid already produced an issue.
        let reported: HashSet<&str> = issues.iter().filter_map(|i| i.field.as_deref()).collect();
        let absent: Vec<&str> = missing
            .into_iter()
            .filter(|m| !reported.contains(m))
            .collect();
        if !absent.is_empty() {
            issues.push(
                BankIssue::new(
                    None,
                    None,
                    format!("missing exam metadata: {}", absent.join(", ")),
                )
                .with_fix(
                    "define min_questions, max_questions, exam_time, passing_score and domains",
                ),
            );
        }
        return None;
    }

    let (min_questions, max_questions) = (meta.min_questions?, meta.max_questions?);
    if min_questions > max_questions {
        issues.push(
            BankIssue::new(
                None,
                Some("min_questions"),
                format!("min_questions ({min_questions}) exceeds max_questions ({max_questions})"),
            )
            .with_fix("min_questions must not be greater than max_questions"),
        );
        return None;
    }

    Some(BankMetadata {
        bank_version,
        min_questions,
        max_questions,
        exam_time_minutes: meta.exam_time?,
        passing_score: meta.passing_score?,
        domains: meta.domains?,
    })
}

fn parse_question_row(
    fields: &[&str],
    line: usize,
    meta: &MetadataRows,
    seen_texts: &mut HashSet<String>,
    issues: &mut Vec<BankIssue>,
) -> Option<Question> {
    if fields.len() != QUESTION_COLUMNS {
        issues.push(
            BankIssue::new(
                Some(line),
                None,
                format!(
                    "incorrect column count: expected {QUESTION_COLUMNS}, got {}",
                    fields.len()
                ),
            )
            .with_fix("question rows need 26 columns, leave unused ones empty"),
        );
        return None;
    }
    let col = |i: usize| fields[i];
    let before = issues.len();

    let (qtype_raw, domain, text, explanation) = (col(0), col(1), col(2), col(3));
    for (i, value) in [(1, domain), (2, text), (3, explanation)] {
        if value.is_empty() {
            issues.push(
                BankIssue::new(Some(line), Some(COLUMN_NAMES[i]), "missing required field")
                    .with_fix("question_text, explanation and domain are required"),
            );
        }
    }

    if !text.is_empty() && !seen_texts.insert(text.to_string()) {
        issues.push(
            BankIssue::new(Some(line), Some("question_text"), "duplicate question text")
                .with_fix("question text must be unique within an exam bank version"),
        );
    }

    if let Some(weights) = &meta.domains {
        if !domain.is_empty() && !weights.contains(domain) {
            issues.push(
                BankIssue::new(Some(line), Some("domain"), "domain not defined in metadata")
                    .with_fix(format!(
                        "domain '{domain}' must be listed in the 'domains' metadata row"
                    )),
            );
        }
    }

    let image_url = non_empty(col(4));
    if let Some(url) = &image_url {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            issues.push(
                BankIssue::new(Some(line), Some("image_url"), "invalid image URL format")
                    .with_fix("must be an http:// or https:// URL"),
            );
        }
    }

    let question_type: QuestionType = match qtype_raw.parse() {
        Ok(t) => t,
        Err(_) => {
            issues.push(
                BankIssue::new(
                    Some(line),
                    Some("question_type"),
                    format!("unknown question type '{qtype_raw}'"),
                )
                .with_fix("must be 'single', 'multi', 'truefalse', or 'fillblank'"),
            );
            return None;
        }
    };

    let mut choices = Vec::new();
    let mut acceptable_answers = Vec::new();
    let mut input_method = InputMethod::Text;

    if question_type.is_choice_based() {
        for n in 0..MAX_CHOICES {
            let base = CHOICE_START + n * 3;
            let choice_text = col(base);
            if choice_text.is_empty() {
                continue;
            }
            let label = (b'A' + choices.len() as u8) as char;
            choices.push(Choice {
                id: n as u32 + 1,
                label,
                text: choice_text.to_string(),
                is_correct: col(base + 1).eq_ignore_ascii_case("true"),
                explanation: col(base + 2).to_string(),
            });
        }

        let correct = choices.iter().filter(|c| c.is_correct).count();
        if choices.is_empty() {
            issues.push(
                BankIssue::new(Some(line), Some("choices"), "no choices provided")
                    .with_fix("choice questions require at least one choice"),
            );
        } else if correct == 0 {
            issues.push(
                BankIssue::new(Some(line), Some("correct_flag"), "no correct answer marked")
                    .with_fix("at least one choice must be marked TRUE"),
            );
        } else if correct > 1
            && matches!(question_type, QuestionType::Single | QuestionType::TrueFalse)
        {
            issues.push(
                BankIssue::new(
                    Some(line),
                    Some("correct_flag"),
                    format!("{question_type} question has {correct} correct choices"),
                )
                .with_fix("mark exactly one choice TRUE, or use type 'multi'"),
            );
        }
    } else {
        acceptable_answers = col(ACCEPTABLE_ANSWERS)
            .split('|')
            .map(|a| a.trim().to_lowercase())
            .filter(|a| !a.is_empty())
            .collect();
        if acceptable_answers.is_empty() {
            issues.push(
                BankIssue::new(
                    Some(line),
                    Some("acceptable_answers"),
                    "missing acceptable answers for fill-in-the-blank",
                )
                .with_fix("provide pipe-separated acceptable answers"),
            );
        }
        match col(6).parse::<InputMethod>() {
            Ok(m) => input_method = m,
            Err(_) => issues.push(
                BankIssue::new(
                    Some(line),
                    Some("input_method"),
                    format!("invalid input_method '{}'", col(6)),
                )
                .with_fix("must be 'text', 'terminal', or empty (defaults to 'text')"),
            ),
        }
    }

    if issues.len() > before {
        return None;
    }

    Some(Question {
        id: 0,
        domain: domain.to_string(),
        question_type,
        text: text.to_string(),
        explanation: explanation.to_string(),
        image_url,
        code_block: non_empty(col(5)),
        input_method,
        choices,
        acceptable_answers,
        bank_version: String::new(),
        validity_score: None,
        flagged: false,
    })
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

/// Non-fatal findings about a parsed bank.
pub fn validate_bank(bank: &QuestionBank) -> Vec<BankIssue> {
    let mut warnings = Vec::new();
    let counts = planner::domain_counts(&bank.questions);
    let at_min = planner::quotas_for(bank.metadata.min_questions, &bank.metadata.domains);

    for (domain, weight) in bank.metadata.domains.iter() {
        let available = counts.get(domain).copied().unwrap_or(0);
        if weight > 0.0 && available == 0 {
            warnings.push(BankIssue::new(
                None,
                Some("domains"),
                format!("weighted domain '{domain}' has no questions"),
            ));
            continue;
        }
        let required = at_min.get(domain).copied().unwrap_or(0);
        if available < required {
            warnings.push(
                BankIssue::new(
                    None,
                    Some("domains"),
                    format!(
                        "domain '{domain}' has {available} question(s) but an exam of \
                         {} needs {required}",
                        bank.metadata.min_questions
                    ),
                )
                .with_fix("add questions to this domain or lower its weight"),
            );
        }
    }

    let by_type: BTreeMap<String, usize> =
        bank.questions.iter().fold(BTreeMap::new(), |mut acc, q| {
            *acc.entry(q.question_type.to_string()).or_insert(0) += 1;
            acc
        });
    tracing::debug!(course = %bank.course.code, ?by_type, "bank question types");

    warnings
}
