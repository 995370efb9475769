use std::collections::{HashMap, HashSet};

use utoipa::ToSchema;

use crate::data::attendance::{AttendanceRecord, AttendanceStatus};
use crate::data::lecture::Lecture;
use crate::data::Id;
use crate::util::percent_label;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSummary {
    pub total_lectures: u64,
    pub present: u64,
    pub absent: u64,
    pub unrecorded: u64,
    pub marked_lectures: u64,
    /// `present / markedLectures`, e.g. `66.67%`.
    pub percentage: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubjectAttendance {
    pub subject: Id,
    pub name: String,
    #[serde(flatten)]
    pub summary: AttendanceSummary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AttendanceReport {
    pub overall: AttendanceSummary,
    pub subjects: Vec<SubjectAttendance>,
}

/// Reduces attendance rows to a summary.
///
/// Only the first row seen for a lecture counts; later rows for the same
/// lecture are ignored.
pub fn summarize<'a>(
    total_lectures: u64,
    records: impl IntoIterator<Item = &'a AttendanceRecord>,
) -> AttendanceSummary {
    let mut seen: HashSet<Id> = HashSet::new();
    let (mut present, mut absent) = (0u64, 0u64);

    for record in records {
        if !seen.insert(record.lecture) {
            continue;
        }
        match record.status {
            AttendanceStatus::Present => present += 1,
            AttendanceStatus::Absent => absent += 1,
        }
    }

    let marked_lectures = seen.len() as u64;
    let percentage = if marked_lectures > 0 {
        present as f64 * 100.0 / marked_lectures as f64
    } else {
        0.0
    };

    AttendanceSummary {
        total_lectures,
        present,
        absent,
        unrecorded: total_lectures.saturating_sub(marked_lectures),
        marked_lectures,
        percentage: percent_label(percentage),
    }
}

/// Summaries per subject, in the order subjects first appear in `lectures`.
pub fn subject_breakdown(
    lectures: &[Lecture],
    records: &[AttendanceRecord],
    names: &HashMap<Id, String>,
) -> Vec<SubjectAttendance> {
    let subject_of: HashMap<Id, Id> = lectures.iter().map(|it| (it.id, it.subject)).collect();

    let mut order: Vec<Id> = vec![];
    let mut totals: HashMap<Id, u64> = HashMap::new();
    for lecture in lectures {
        let total = totals.entry(lecture.subject).or_insert_with(|| {
            order.push(lecture.subject);
            0
        });
        *total += 1;
    }

    order
        .into_iter()
        .map(|subject| {
            let rows = records
                .iter()
                .filter(|it| subject_of.get(&it.lecture) == Some(&subject));
            SubjectAttendance {
                subject,
                name: names.get(&subject).cloned().unwrap_or_default(),
                summary: summarize(totals[&subject], rows),
            }
        })
        .collect()
}
