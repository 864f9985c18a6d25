//! The `recap init` command.

use std::path::Path;

use anyhow::{Context, Result};

pub fn execute() -> Result<()> {
    write_if_absent(Path::new("recap.toml"), SAMPLE_CONFIG)?;

    let course_dir = Path::new("courses").join("sample-101");
    std::fs::create_dir_all(&course_dir)
        .with_context(|| format!("failed to create {}", course_dir.display()))?;
    write_if_absent(&course_dir.join("course.yaml"), SAMPLE_COURSE)?;
    write_if_absent(&course_dir.join("exam_bank.csv"), SAMPLE_BANK)?;

    println!("\nNext steps:");
    println!("  1. Run: recap validate --bank courses/sample-101");
    println!("  2. Run: recap plan --bank courses/sample-101");
    println!("  3. Run: recap ingest");
    println!("  4. Run: recap exams --course sample-101");

    Ok(())
}

fn write_if_absent(path: &Path, content: &str) -> Result<()> {
    if path.exists() {
        println!("{} already exists, skipping.", path.display());
    } else {
        std::fs::write(path, content)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Created {}", path.display());
    }
    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# recap configuration

courses_dir = "./courses"
ingestion_interval_secs = 300
validity_interval_secs = 86400
validity_threshold = 0.25
# per_exam: a question may appear in several exams of one run.
# per_batch: every exam of a run gets distinct questions.
reuse_scope = "per_exam"

[store]
type = "json"
path = "./recap-data/store.json"
"#;

const SAMPLE_COURSE: &str = r#"marketing_name: "Recap Sample"
course_code: "sample-101"
duration_days: 1
"#;

const SAMPLE_BANK: &str = "\
schema_version,1.0.0
min_questions,2
max_questions,4
exam_time,15
passing_score,60
domains,Basics:0.5|Advanced:0.5
single,Basics,Which file format holds the course metadata?,Course metadata lives in course.yaml.,,,,YAML,TRUE,,CSV,FALSE,,TOML,FALSE,,,,,,,,,,,
truefalse,Basics,Every question row has 26 columns.,Unused columns are left empty.,,,,True,TRUE,,False,FALSE,,,,,,,,,,,,,,
fillblank,Basics,Which command prints the recap version?,Use the --version flag.,,,terminal,,,,,,,,,,,,,,,,,,,recap --version
multi,Advanced,Which values are valid question types?,\"single, multi, truefalse and fillblank are supported.\",,,,single,TRUE,,fillblank,TRUE,,essay,FALSE,,,,,,,,,,,
single,Advanced,What decides which questions an exam gets?,\"A seed derived from bank version, course name and exam index.\",,,,A deterministic seed,TRUE,,The wall clock,FALSE,,Row order only,FALSE,,,,,,,,,,,
fillblank,Advanced,Name the metadata row that sets the bank version.,schema_version tags the bank version.,,,text,,,,,,,,,,,,,,,,,,,schema_version
";
