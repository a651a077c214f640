//! The registration sheet: one row per registration, kept in SQLite.


use {
    crate::{
        i18n::{self, Locale},
        participant::Participant,
        registration::Registration,
        track::Track,
    },
    chrono::{DateTime, Utc},
    rocket_sync_db_pools::rusqlite,
    rusqlite::{named_params, OptionalExtension},
    serde::Serialize,
    thiserror::Error,
};

macro_rules! match_constraint_violation {
    ($statement:expr, $custom_error:expr) => {
        match $statement {
            Err(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: rusqlite::ErrorCode::ConstraintViolation,
                    ..
                },
                _,
            )) => Err($custom_error),
            Err(err) => Err(err.into()),
            _ => Ok(()),
        }
    };
}

/// Status of a row whose payment is still outstanding at the processor.
pub const STATUS_PENDING: &str = "pending";

/// Status of rows with nothing to pay.
pub const STATUS_NO_PAYMENT_REQUIRED: &str = "no_payment_required";

/// Status of waiting list rows, which are never paid for.
pub const STATUS_WAITING_LIST: &str = "Waiting List";

/// A registration as written to the sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SheetRow {
    pub registered_at: DateTime<Utc>,
    pub track: Track,
    /// The language the registration was made in, used for follow-up mails.
    pub language: Locale,
    pub name: String,
    pub age: u8,
    pub gender: String,
    pub email: String,
    pub phone: String,
    /// Activity tags of the representative, comma separated.
    pub events: String,
    /// Additional participants, see [`format_participants`].
    pub participants: String,
    pub notes: String,
    pub amount: u32,
    pub payment_status: String,
    pub session_id: Option<String>,
    pub total_participants: i64,
    /// Members in the free age bracket.
    pub free_participants: i64,
    /// Members in the paying age bracket.
    pub paid_participants: i64,
    pub club_experience: Option<String>,
    pub exercise_frequency: Option<String>,
}

impl SheetRow {
    #[must_use]
    pub fn from_registration(
        registration: &Registration,
        payment_status: &str,
        session_id: Option<&str>,
        language: Locale,
        registered_at: DateTime<Utc>,
    ) -> Self {
        let representative = &registration.representative;
        let (free, paid) = registration.bracket_counts();

        Self {
            registered_at,
            track: registration.track,
            language,
            name: representative.person.name.clone(),
            age: representative.person.age,
            gender: representative.person.gender.as_str().to_string(),
            email: representative.email.to_string(),
            phone: representative.phone.clone().unwrap_or_default(),
            events: join_events(&representative.person),
            participants: format_participants(&registration.participants),
            notes: representative.notes.clone().unwrap_or_default(),
            amount: registration.total_fee(),
            payment_status: payment_status.to_string(),
            session_id: session_id.map(ToString::to_string),
            total_participants: to_count(registration.headcount()),
            free_participants: to_count(free),
            paid_participants: to_count(paid),
            club_experience: registration.survey.club_experience.clone(),
            exercise_frequency: registration.survey.exercise_frequency.clone(),
        }
    }
}

fn to_count(count: usize) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

fn join_events(person: &Participant) -> String {
    person
        .events
        .iter()
        .map(|activity| activity.tag())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Human readable listing of the additional participants. Numbering starts at 2, the
/// representative being the first participant.
#[must_use]
pub fn format_participants(participants: &[Participant]) -> String {
    participants
        .iter()
        .enumerate()
        .map(|(i, participant)| {
            format!(
                "Participant {}: {} ({}, {}) - events: {}",
                i + 2,
                participant.name,
                participant.age,
                participant.gender.as_str(),
                join_events(participant),
            )
        })
        .collect::<Vec<_>>()
        .join(" | ")
}

// Note: Only usable with the column order of `SELECT_ROW`
#[doc(hidden)]
fn row_to_sheet_row(row: &rusqlite::Row) -> rusqlite::Result<SheetRow> {
    Ok(SheetRow {
        registered_at: row.get(0)?,
        track: Track::parse(&row.get::<_, String>(1)?).unwrap_or_default(),
        language: Locale::parse(&row.get::<_, String>(2)?).unwrap_or(i18n::FALLBACK),
        name: row.get(3)?,
        age: row.get(4)?,
        gender: row.get(5)?,
        email: row.get(6)?,
        phone: row.get(7)?,
        events: row.get(8)?,
        participants: row.get(9)?,
        notes: row.get(10)?,
        amount: row.get(11)?,
        payment_status: row.get(12)?,
        session_id: row.get(13)?,
        total_participants: row.get(14)?,
        free_participants: row.get(15)?,
        paid_participants: row.get(16)?,
        club_experience: row.get(17)?,
        exercise_frequency: row.get(18)?,
    })
}

const SELECT_ROW: &str = "SELECT registered_at, track, language, name, age, gender, email, phone,
        events, participants, notes, amount, payment_status, session_id, total_participants,
        free_participants, paid_participants, club_experience, exercise_frequency
    FROM registration_sheet";

pub enum DatabaseStatus {
    AlreadyExistent,
    Created,
}

pub fn init_db_if_necessary(
    conn: &mut rusqlite::Connection,
) -> Result<DatabaseStatus, rusqlite::Error> {
    // dummy query to see if the table is there, with the columns we expect
    if conn
        .execute(
            "SELECT row_id, session_id, payment_status
            FROM registration_sheet
            WHERE false",
            [],
        )
        .is_err()
    {
        conn.execute_batch(include_str!("./init_db.sql"))?;
        Ok(DatabaseStatus::Created)
    } else {
        Ok(DatabaseStatus::AlreadyExistent)
    }
}

#[derive(Debug, Error)]
pub enum AppendRowError {
    #[error("Database or query error: {0}")]
    RusqliteError(#[from] rusqlite::Error),
    #[error("A row for this checkout session already exists")]
    DuplicateSession,
}

/// Appends a row to the sheet. Rows are never rewritten apart from their payment status.
pub fn append_row(conn: &mut rusqlite::Connection, row: &SheetRow) -> Result<(), AppendRowError> {
    match_constraint_violation!(
        conn.execute(
            "INSERT INTO registration_sheet (
                registered_at, track, language, name, age, gender, email, phone, events,
                participants, notes, amount, payment_status, session_id, total_participants,
                free_participants, paid_participants, club_experience, exercise_frequency
            )
            VALUES (
                :registered_at, :track, :language, :name, :age, :gender, :email, :phone, :events,
                :participants, :notes, :amount, :payment_status, :session_id, :total_participants,
                :free_participants, :paid_participants, :club_experience, :exercise_frequency
            )",
            named_params! {
                ":registered_at": row.registered_at,
                ":track": row.track.as_str(),
                ":language": row.language.as_str(),
                ":name": row.name,
                ":age": row.age,
                ":gender": row.gender,
                ":email": row.email,
                ":phone": row.phone,
                ":events": row.events,
                ":participants": row.participants,
                ":notes": row.notes,
                ":amount": row.amount,
                ":payment_status": row.payment_status,
                ":session_id": row.session_id,
                ":total_participants": row.total_participants,
                ":free_participants": row.free_participants,
                ":paid_participants": row.paid_participants,
                ":club_experience": row.club_experience,
                ":exercise_frequency": row.exercise_frequency,
            },
        ),
        AppendRowError::DuplicateSession
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusUpdate {
    Updated,
    /// No row carries the session id.
    NotFound,
}

/// Sets the payment status of the row belonging to `session_id`.
pub fn update_payment_status(
    conn: &mut rusqlite::Connection,
    session_id: &str,
    status: &str,
) -> Result<StatusUpdate, rusqlite::Error> {
    let changed = conn.execute(
        "UPDATE registration_sheet
        SET payment_status = :status
        WHERE session_id == :session_id",
        named_params! {
            ":session_id": session_id,
            ":status": status,
        },
    )?;

    Ok(if changed == 0 {
        StatusUpdate::NotFound
    } else {
        StatusUpdate::Updated
    })
}

/// Looks up the row belonging to a checkout session. Session ids are unique, so there's at most
/// one.
pub fn find_row_by_session(
    conn: &mut rusqlite::Connection,
    session_id: &str,
) -> Result<Option<SheetRow>, rusqlite::Error> {
    conn.query_row(
        &format!("{SELECT_ROW} WHERE session_id == :session_id"),
        named_params! { ":session_id": session_id },
        row_to_sheet_row,
    )
    .optional()
}

/// All rows in the order they were appended.
pub fn list_rows(conn: &mut rusqlite::Connection) -> Result<Vec<SheetRow>, rusqlite::Error> {
    let mut statement = conn.prepare(&format!("{SELECT_ROW} ORDER BY row_id"))?;
    let rows = statement.query_map([], row_to_sheet_row)?;
    rows.collect()
}

/// How many people registered so far, waiting list rows not counted.
pub fn current_participants(conn: &mut rusqlite::Connection) -> Result<i64, rusqlite::Error> {
    conn.query_row(
        "SELECT COALESCE(SUM(total_participants), 0)
        FROM registration_sheet
        WHERE track != :waiting_list",
        named_params! { ":waiting_list": Track::WaitingList.as_str() },
        |row| row.get(0),
    )
}
