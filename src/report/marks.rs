use std::collections::HashMap;
use std::fmt::{Display, Formatter};

use chrono::NaiveDate;
use utoipa::ToSchema;

use crate::data::marks::MarksRecord;
use crate::data::Id;
use crate::util::round1;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize, ToSchema)]
pub enum Grade {
    #[serde(rename = "A+")]
    APlus,
    A,
    #[serde(rename = "B+")]
    BPlus,
    B,
    C,
    D,
}

impl Grade {
    /// Fixed ladder with inclusive lower bounds.
    pub fn from_percentage(percentage: f64) -> Grade {
        match percentage {
            p if p >= 90.0 => Grade::APlus,
            p if p >= 80.0 => Grade::A,
            p if p >= 70.0 => Grade::BPlus,
            p if p >= 60.0 => Grade::B,
            p if p >= 50.0 => Grade::C,
            _ => Grade::D,
        }
    }
}

impl Display for Grade {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Grade::APlus => "A+",
            Grade::A => "A",
            Grade::BPlus => "B+",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
        };
        write!(f, "{}", label)
    }
}

/// `obtained / possible` as a percentage rounded to one decimal, or `None`
/// when nothing was possible.
pub fn percentage(obtained: f64, possible: f64) -> Option<f64> {
    (possible > 0.0).then(|| round1(obtained * 100.0 / possible))
}

/// Score of a single test as shown to students, e.g. `"90.0"`.
pub fn test_percentage(marks: f64, total_marks: f64) -> Option<String> {
    percentage(marks, total_marks).map(|it| format!("{:.1}", it))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub record: Id,
    pub lecture: Id,
    pub date: Option<NaiveDate>,
    pub description: Option<String>,
    pub marks: f64,
    pub total_marks: f64,
    /// One decimal, e.g. `90.0`; absent for a zero total.
    pub percentage: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubjectMarks {
    pub subject: Id,
    pub name: String,
    /// Most recent first.
    pub tests: Vec<TestResult>,
    pub total_obtained: f64,
    pub total_possible: f64,
    pub percentage: Option<f64>,
    pub grade: Option<Grade>,
    /// Newest test percentage minus the oldest one.
    pub improvement: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MarksReport {
    pub subjects: Vec<SubjectMarks>,
    pub tests_taken: usize,
    pub total_obtained: f64,
    pub total_possible: f64,
    pub percentage: Option<f64>,
    pub grade: Option<Grade>,
}

fn test_result(record: &MarksRecord, dates: &HashMap<Id, NaiveDate>) -> TestResult {
    TestResult {
        record: record.id,
        lecture: record.lecture,
        date: dates.get(&record.lecture).copied(),
        description: record.description.clone(),
        marks: record.marks,
        total_marks: record.total_marks,
        percentage: test_percentage(record.marks, record.total_marks),
    }
}

fn improvement(tests: &[TestResult]) -> Option<f64> {
    let mut scored = tests
        .iter()
        .filter_map(|it| percentage(it.marks, it.total_marks));
    let newest = scored.next()?;
    let oldest = scored.last().unwrap_or(newest);
    Some(round1(newest - oldest))
}

/// Groups a student's marks by subject.
///
/// `records` must be most recent first; subjects keep the order in which
/// they first appear. `dates` and `names` label lectures and subjects.
pub fn analyze(
    records: &[MarksRecord],
    dates: &HashMap<Id, NaiveDate>,
    names: &HashMap<Id, String>,
) -> MarksReport {
    let mut subjects: Vec<SubjectMarks> = vec![];
    let mut index: HashMap<Id, usize> = HashMap::new();

    for record in records {
        let at = *index.entry(record.subject).or_insert_with(|| {
            subjects.push(SubjectMarks {
                subject: record.subject,
                name: names.get(&record.subject).cloned().unwrap_or_default(),
                tests: vec![],
                total_obtained: 0.0,
                total_possible: 0.0,
                percentage: None,
                grade: None,
                improvement: None,
            });
            subjects.len() - 1
        });

        let subject = &mut subjects[at];
        subject.total_obtained += record.marks;
        subject.total_possible += record.total_marks;
        subject.tests.push(test_result(record, dates));
    }

    for subject in subjects.iter_mut() {
        subject.percentage = percentage(subject.total_obtained, subject.total_possible);
        subject.grade = subject.percentage.map(Grade::from_percentage);
        subject.improvement = improvement(&subject.tests);
    }

    let total_obtained: f64 = subjects.iter().map(|it| it.total_obtained).sum();
    let total_possible: f64 = subjects.iter().map(|it| it.total_possible).sum();
    let overall = percentage(total_obtained, total_possible);

    MarksReport {
        tests_taken: records.len(),
        subjects,
        total_obtained,
        total_possible,
        percentage: overall,
        grade: overall.map(Grade::from_percentage),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(subject: Id, marks: f64, total_marks: f64) -> MarksRecord {
        MarksRecord {
            id: Id::new(),
            student: Id::new(),
            lecture: Id::new(),
            subject,
            marks,
            total_marks,
            description: None,
            created_by: Id::new(),
            created: Utc::now(),
        }
    }

    #[test]
    fn grade_boundaries_go_to_the_higher_band() {
        assert_eq!(Grade::from_percentage(100.0), Grade::APlus);
        assert_eq!(Grade::from_percentage(90.0), Grade::APlus);
        assert_eq!(Grade::from_percentage(89.9), Grade::A);
        assert_eq!(Grade::from_percentage(80.0), Grade::A);
        assert_eq!(Grade::from_percentage(70.0), Grade::BPlus);
        assert_eq!(Grade::from_percentage(60.0), Grade::B);
        assert_eq!(Grade::from_percentage(50.0), Grade::C);
        assert_eq!(Grade::from_percentage(49.9), Grade::D);
        assert_eq!(Grade::from_percentage(0.0), Grade::D);
    }

    #[test]
    fn grades_are_monotonic_over_the_whole_range() {
        let mut previous = Grade::from_percentage(0.0);
        for tenth in 0..=1000 {
            let grade = Grade::from_percentage(tenth as f64 / 10.0);
            // Better grades order first.
            assert!(grade <= previous, "{} after {}", grade, previous);
            previous = grade;
        }
        assert_eq!(previous, Grade::APlus);
    }

    #[test]
    fn grades_serialize_with_plus_signs() {
        assert_eq!(serde_json::to_string(&Grade::APlus).unwrap(), "\"A+\"");
        assert_eq!(serde_json::to_string(&Grade::B).unwrap(), "\"B\"");
        assert_eq!(Grade::BPlus.to_string(), "B+");
    }

    #[test]
    fn forty_five_of_fifty_is_an_a_plus() {
        let maths = Id::new();
        let report = analyze(
            &[record(maths, 45.0, 50.0)],
            &HashMap::new(),
            &HashMap::from([(maths, "Maths".to_string())]),
        );

        let subject = &report.subjects[0];
        assert_eq!(subject.name, "Maths");
        assert_eq!(subject.tests[0].percentage.as_deref(), Some("90.0"));
        assert_eq!(subject.percentage, Some(90.0));
        assert_eq!(subject.grade, Some(Grade::APlus));
        assert_eq!(subject.improvement, Some(0.0));
        assert_eq!(report.grade, Some(Grade::APlus));
        assert_eq!(report.tests_taken, 1);
    }

    #[test]
    fn subjects_and_overall_accumulate() {
        let (maths, physics) = (Id::new(), Id::new());
        // Most recent first.
        let records = vec![
            record(maths, 18.0, 20.0),
            record(physics, 30.0, 50.0),
            record(maths, 12.0, 20.0),
        ];

        let report = analyze(&records, &HashMap::new(), &HashMap::new());

        assert_eq!(report.subjects.len(), 2);
        let m = &report.subjects[0];
        assert_eq!(m.subject, maths);
        assert_eq!(m.tests.len(), 2);
        assert_eq!(m.total_obtained, 30.0);
        assert_eq!(m.total_possible, 40.0);
        assert_eq!(m.percentage, Some(75.0));
        assert_eq!(m.grade, Some(Grade::BPlus));
        // 90% newest against 60% oldest.
        assert_eq!(m.improvement, Some(30.0));

        assert_eq!(report.total_obtained, 60.0);
        assert_eq!(report.total_possible, 90.0);
        assert_eq!(report.percentage, Some(66.7));
        assert_eq!(report.grade, Some(Grade::B));
    }

    #[test]
    fn zero_totals_report_no_data() {
        let subject = Id::new();
        let report = analyze(&[record(subject, 0.0, 0.0)], &HashMap::new(), &HashMap::new());

        assert_eq!(report.subjects[0].percentage, None);
        assert_eq!(report.subjects[0].grade, None);
        assert_eq!(report.subjects[0].improvement, None);
        assert_eq!(report.subjects[0].tests[0].percentage, None);
        assert_eq!(report.percentage, None);
        assert_eq!(report.grade, None);
    }

    #[test]
    fn single_test_percentages_keep_one_decimal() {
        assert_eq!(test_percentage(45.0, 50.0).as_deref(), Some("90.0"));
        assert_eq!(test_percentage(2.0, 3.0).as_deref(), Some("66.7"));
        assert_eq!(test_percentage(1.0, 0.0), None);
    }

    #[test]
    fn empty_history_is_empty_report() {
        let report = analyze(&[], &HashMap::new(), &HashMap::new());
        assert!(report.subjects.is_empty());
        assert_eq!(report.tests_taken, 0);
        assert_eq!(report.grade, None);
    }

    #[test]
    fn tests_are_labelled_with_lecture_dates() {
        let subject = Id::new();
        let r = record(subject, 5.0, 10.0);
        let date = NaiveDate::from_ymd_opt(2024, 2, 2).unwrap();
        let report = analyze(
            &[r.clone()],
            &HashMap::from([(r.lecture, date)]),
            &HashMap::new(),
        );

        assert_eq!(report.subjects[0].tests[0].date, Some(date));
        assert_eq!(report.subjects[0].tests[0].percentage.as_deref(), Some("50.0"));
    }
}
