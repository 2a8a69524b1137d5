//! Default datasets used to initialize collections on first read.
//!
//! A collection is seeded exactly once: when its storage key has never been
//! written. Writing an empty collection counts as written.

use crate::{record::Fields, CollectionName, Record};
use serde_json::{json, Value};
use std::collections::HashMap;

/// Well-known collection names.
pub mod collections {
    pub const STUDENTS: &str = "students";
    pub const FINANCE: &str = "finance";
    pub const LEAVE_REQUESTS: &str = "leave_requests";
    pub const ATTENDANCE: &str = "attendance";
    pub const COMPETENCIES: &str = "competencies";
    pub const USERS: &str = "users";
    pub const ASSESSMENTS: &str = "assessments";
    pub const NOTIFICATIONS: &str = "notifications";
    pub const STUDENT_NOTES: &str = "student_notes";
    pub const EVENTS: &str = "events";
    pub const CONSENTS: &str = "consents";
    pub const TIMETABLE: &str = "timetable";
    pub const SUPPORT_TICKETS: &str = "support_tickets";
    pub const ADMISSIONS_APPLICATIONS: &str = "admissions_applications";
    pub const COMMUNICATION_TEMPLATES: &str = "communication_templates";
    pub const TRANSPORT_ROUTES: &str = "transport_routes";
    pub const TRANSPORT_VEHICLES: &str = "transport_vehicles";
    pub const TRANSPORT_LOGS: &str = "transport_logs";
    pub const STAFF: &str = "staff";
    pub const POINTS: &str = "points";

    /// Every collection the school catalog seeds.
    pub const ALL: [&str; 20] = [
        STUDENTS,
        FINANCE,
        LEAVE_REQUESTS,
        ATTENDANCE,
        COMPETENCIES,
        USERS,
        ASSESSMENTS,
        NOTIFICATIONS,
        STUDENT_NOTES,
        EVENTS,
        CONSENTS,
        TIMETABLE,
        SUPPORT_TICKETS,
        ADMISSIONS_APPLICATIONS,
        COMMUNICATION_TEMPLATES,
        TRANSPORT_ROUTES,
        TRANSPORT_VEHICLES,
        TRANSPORT_LOGS,
        STAFF,
        POINTS,
    ];
}

/// Static mapping from collection name to its initial records.
///
/// Names without an entry seed as empty.
#[derive(Debug, Clone, Default)]
pub struct SeedCatalog {
    defaults: HashMap<CollectionName, Vec<Record>>,
    settings: Fields,
}

impl SeedCatalog {
    /// A catalog that seeds nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Register the defaults for one collection, replacing any previous ones.
    pub fn with_collection(
        mut self,
        name: impl Into<CollectionName>,
        records: Vec<Record>,
    ) -> Self {
        self.defaults.insert(name.into(), records);
        self
    }

    /// Set the default settings object returned by the config singleton.
    pub fn with_settings(mut self, settings: Fields) -> Self {
        self.settings = settings;
        self
    }

    /// Defaults for `name` (empty when unknown).
    pub fn defaults_for(&self, name: &str) -> Vec<Record> {
        self.defaults.get(name).cloned().unwrap_or_default()
    }

    /// Whether the catalog has an entry for `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.defaults.contains_key(name)
    }

    /// Names with registered defaults, sorted.
    pub fn collection_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.defaults.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Default settings object.
    pub fn settings(&self) -> &Fields {
        &self.settings
    }

    /// The built-in dataset of a small CBC primary school.
    pub fn school_defaults() -> Self {
        let mut catalog = Self::empty().with_settings(object(json!({
            "schoolName": "Greenfield Academy",
            "motto": "Excellence in Character",
            "currency": "KES",
            "currentTerm": "Term 1",
            "academicYear": 2024,
            "curriculum": "CBC",
            "smsEnabled": true,
            "mpesaPaybill": "522533"
        })));

        for (name, value) in school_seed_data() {
            catalog = catalog.with_collection(name, records(value));
        }
        catalog
    }
}

/// Raw seed arrays of the school catalog, one per collection.
fn school_seed_data() -> [(&'static str, Value); 20] {
    use collections::*;

    [
        (
            STUDENTS,
            json!([
                {"id": "1", "name": "Amani Wanjiru", "admissionNumber": "GFA/2021/001", "grade": "Grade 4", "stream": "East", "gender": "F", "status": "Active", "feeBalance": 12500, "guardianName": "Grace Wanjiru", "guardianPhone": "0712345678", "transportRouteId": "r1"},
                {"id": "2", "name": "Brian Otieno", "admissionNumber": "GFA/2020/014", "grade": "Grade 5", "stream": "West", "gender": "M", "status": "Active", "feeBalance": 0, "guardianName": "Paul Otieno", "guardianPhone": "0723456789", "transportRouteId": "r2"},
                {"id": "3", "name": "Cynthia Chebet", "admissionNumber": "GFA/2022/031", "grade": "Grade 3", "stream": "East", "gender": "F", "status": "Active", "feeBalance": 4800, "guardianName": "Ruth Chebet", "guardianPhone": "0734567890"},
                {"id": "4", "name": "David Mwangi", "admissionNumber": "GFA/2019/007", "grade": "Grade 6", "stream": "West", "gender": "M", "status": "Suspended", "feeBalance": 21000, "guardianName": "James Mwangi", "guardianPhone": "0745678901", "transportRouteId": "r1"}
            ]),
        ),
        (
            FINANCE,
            json!([
                {"id": "tx1", "studentId": "1", "type": "FEE_PAYMENT", "method": "MPESA", "reference": "QAB12CD34E", "amount": 15000, "date": "2024-01-08", "status": "Completed"},
                {"id": "tx2", "studentId": "2", "type": "FEE_PAYMENT", "method": "BANK", "reference": "EQ-998812", "amount": 32000, "date": "2024-01-10", "status": "Completed"},
                {"id": "tx3", "type": "EXPENSE", "category": "Stationery", "amount": 8400, "date": "2024-01-12", "status": "Pending"}
            ]),
        ),
        (
            LEAVE_REQUESTS,
            json!([
                {"id": "lr1", "staffId": "st2", "type": "Sick", "startDate": "2024-02-05", "endDate": "2024-02-07", "reason": "Medical appointment", "status": "Pending"},
                {"id": "lr2", "staffId": "st3", "type": "Annual", "startDate": "2024-04-15", "endDate": "2024-04-19", "reason": "Family travel", "status": "Approved"}
            ]),
        ),
        (
            ATTENDANCE,
            json!([
                {"id": "at1", "studentId": "1", "date": "2024-01-15", "status": "Present"},
                {"id": "at2", "studentId": "2", "date": "2024-01-15", "status": "Absent", "reason": "Sick"},
                {"id": "at3", "studentId": "3", "date": "2024-01-15", "status": "Late"}
            ]),
        ),
        (
            COMPETENCIES,
            json!([
                {"id": "cp1", "studentId": "1", "learningArea": "Mathematics", "strand": "Numbers", "level": "EE", "term": "Term 1"},
                {"id": "cp2", "studentId": "1", "learningArea": "English", "strand": "Reading", "level": "ME", "term": "Term 1"},
                {"id": "cp3", "studentId": "2", "learningArea": "Science & Technology", "strand": "Living Things", "level": "AE", "term": "Term 1"}
            ]),
        ),
        (
            USERS,
            json!([
                {"id": "u1", "name": "Mary Njeri", "email": "admin@greenfield.ac.ke", "role": "ADMIN"},
                {"id": "u2", "name": "John Kamau", "email": "teacher@greenfield.ac.ke", "role": "TEACHER"},
                {"id": "u3", "name": "Grace Wanjiru", "email": "parent@greenfield.ac.ke", "role": "PARENT", "studentIds": ["1"]},
                {"id": "u4", "name": "Peter Ouma", "email": "bursar@greenfield.ac.ke", "role": "BURSAR"}
            ]),
        ),
        (
            ASSESSMENTS,
            json!([
                {"id": "as1", "title": "Mid-Term Mathematics", "grade": "Grade 4", "learningArea": "Mathematics", "date": "2024-02-20", "maxScore": 100},
                {"id": "as2", "title": "Science Project", "grade": "Grade 5", "learningArea": "Science & Technology", "date": "2024-03-01", "maxScore": 50}
            ]),
        ),
        (
            NOTIFICATIONS,
            json!([
                {"id": "n1", "title": "Fee Reminder", "message": "Term 1 fees are due by 31st January.", "audience": "PARENT", "read": false, "date": "2024-01-20"},
                {"id": "n2", "title": "Staff Meeting", "message": "Staff meeting on Friday at 3pm.", "audience": "TEACHER", "read": false, "date": "2024-01-22"}
            ]),
        ),
        (
            STUDENT_NOTES,
            json!([
                {"id": "sn1", "studentId": "4", "author": "John Kamau", "category": "Discipline", "note": "Parent meeting scheduled regarding conduct.", "date": "2024-01-18"}
            ]),
        ),
        (
            EVENTS,
            json!([
                {"id": "ev1", "title": "Opening Day", "date": "2024-01-08", "type": "ACADEMIC"},
                {"id": "ev2", "title": "Sports Day", "date": "2024-03-15", "type": "SPORTS"},
                {"id": "ev3", "title": "Parents' Meeting", "date": "2024-02-10", "type": "MEETING"}
            ]),
        ),
        (
            CONSENTS,
            json!([
                {"id": "cs1", "title": "Nairobi National Park Trip", "description": "Grade 5 field trip.", "dueDate": "2024-02-28", "responses": {"2": "APPROVED"}}
            ]),
        ),
        (
            TIMETABLE,
            json!([
                {"id": "tt1", "grade": "Grade 4", "day": "Monday", "start": "08:00", "end": "08:40", "learningArea": "Mathematics", "teacherId": "st2"},
                {"id": "tt2", "grade": "Grade 4", "day": "Monday", "start": "08:40", "end": "09:20", "learningArea": "English", "teacherId": "st3"}
            ]),
        ),
        (
            SUPPORT_TICKETS,
            json!([
                {"id": "tk1", "subject": "Cannot download report card", "raisedBy": "u3", "priority": "Medium", "status": "Open", "createdAt": "2024-01-25"}
            ]),
        ),
        (
            ADMISSIONS_APPLICATIONS,
            json!([
                {"id": "ap1", "applicantName": "Esther Akinyi", "gradeApplied": "Grade 1", "guardianPhone": "0756789012", "stage": "Interview", "submittedAt": "2024-01-05"},
                {"id": "ap2", "applicantName": "Felix Kiprono", "gradeApplied": "PP2", "guardianPhone": "0767890123", "stage": "Submitted", "submittedAt": "2024-01-19"}
            ]),
        ),
        (
            COMMUNICATION_TEMPLATES,
            json!([
                {"id": "ct1", "name": "Fee Balance Reminder", "channel": "SMS", "body": "Dear {{guardianName}}, {{studentName}} has a balance of KES {{feeBalance}}."},
                {"id": "ct2", "name": "Absence Alert", "channel": "SMS", "body": "Dear {{guardianName}}, {{studentName}} was absent today."}
            ]),
        ),
        (
            TRANSPORT_ROUTES,
            json!([
                {"id": "r1", "name": "Route A - Westlands", "stops": ["Sarit Centre", "ABC Place", "Kangemi"], "vehicleId": "v1", "fee": 6000},
                {"id": "r2", "name": "Route B - Kilimani", "stops": ["Yaya Centre", "Adams Arcade"], "vehicleId": "v2", "fee": 5500}
            ]),
        ),
        (
            TRANSPORT_VEHICLES,
            json!([
                {"id": "v1", "registration": "KDA 123A", "capacity": 33, "driver": "Samuel Kiptoo", "status": "Active"},
                {"id": "v2", "registration": "KCZ 456B", "capacity": 14, "driver": "Joseph Mutua", "status": "Maintenance"}
            ]),
        ),
        (
            TRANSPORT_LOGS,
            json!([
                {"id": "tl1", "vehicleId": "v1", "routeId": "r1", "date": "2024-01-15", "type": "PICKUP", "odometer": 45210, "studentsOnBoard": 28}
            ]),
        ),
        (
            STAFF,
            json!([
                {"id": "st1", "name": "Mary Njeri", "role": "Principal", "department": "Administration", "phone": "0711000001", "salary": 120000, "status": "Active"},
                {"id": "st2", "name": "John Kamau", "role": "Teacher", "department": "Mathematics", "phone": "0711000002", "salary": 65000, "status": "Active"},
                {"id": "st3", "name": "Alice Achieng", "role": "Teacher", "department": "Languages", "phone": "0711000003", "salary": 62000, "status": "On Leave"}
            ]),
        ),
        (
            POINTS,
            json!([
                {"id": "p1", "studentId": "1", "points": 15, "reason": "Helping a classmate", "awardedBy": "st2", "date": "2024-01-16"},
                {"id": "p2", "studentId": "4", "points": -5, "reason": "Late to class", "awardedBy": "st3", "date": "2024-01-17"}
            ]),
        ),
    ]
}

fn object(value: Value) -> Fields {
    match value {
        Value::Object(fields) => fields,
        _ => Fields::new(),
    }
}

fn records(value: Value) -> Vec<Record> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| Record::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    }
}
