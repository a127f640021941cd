//! Repeatable sub-tables of a session (complaints, medications, ...).
//!
//! Each sub-table is an ordered sequence of small flat records. Form input
//! arrives as a grid of cells; the column-to-field mapping is fixed per kind.

use serde::{Deserialize, Serialize};

/// The six repeatable sub-tables of a session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SubTableKind {
    Complaints,
    Medications,
    Healthcare,
    Therapies,
    Injuries,
    Operations,
}

impl SubTableKind {
    /// All kinds, in form order.
    pub const ALL: [SubTableKind; 6] = [
        SubTableKind::Complaints,
        SubTableKind::Medications,
        SubTableKind::Healthcare,
        SubTableKind::Therapies,
        SubTableKind::Injuries,
        SubTableKind::Operations,
    ];

    /// Field names, in column order.
    pub fn columns(self) -> &'static [&'static str] {
        match self {
            SubTableKind::Complaints => ComplaintRow::COLUMNS,
            SubTableKind::Medications => MedicationRow::COLUMNS,
            SubTableKind::Healthcare => HealthcareRow::COLUMNS,
            SubTableKind::Therapies => TherapyRow::COLUMNS,
            SubTableKind::Injuries => InjuryRow::COLUMNS,
            SubTableKind::Operations => OperationRow::COLUMNS,
        }
    }

    /// Column headings shown on the session detail view.
    pub fn headings(self) -> &'static [&'static str] {
        match self {
            SubTableKind::Complaints => &["Complaint", "Since", "Causes", "Severity"],
            SubTableKind::Medications => &["Medication", "Since?", "Adverse Effects?"],
            SubTableKind::Healthcare => &["Healthcare Provider", "For (Condition)", "Treatment"],
            SubTableKind::Therapies => &["Therapy Type", "Since?", "Results?"],
            SubTableKind::Injuries => &["Injury or Condition", "Since?", "Complications?"],
            SubTableKind::Operations => &["Operation Type", "When?", "Complications?"],
        }
    }

    /// Section title shown on the session detail view.
    pub fn title(self) -> &'static str {
        match self {
            SubTableKind::Complaints => "Chief Complaints",
            SubTableKind::Medications => "Medications",
            SubTableKind::Healthcare => "Current Healthcare",
            SubTableKind::Therapies => "Current Therapy/Treatment",
            SubTableKind::Injuries => "Other Injuries/Conditions",
            SubTableKind::Operations => "Operations",
        }
    }
}

/// A flat sub-table record with a fixed column order.
pub trait TableRow: Sized {
    const KIND: SubTableKind;
    const COLUMNS: &'static [&'static str];

    /// Build from positional cells; missing cells become empty.
    fn from_cells(cells: &[String]) -> Self;

    /// Cell values in column order.
    fn cells(&self) -> Vec<&str>;

    /// The first column, which identifies the row.
    fn primary(&self) -> &str {
        self.cells().first().copied().unwrap_or("")
    }
}

macro_rules! table_row {
    ($(#[$meta:meta])* $name:ident, $kind:expr, [$($field:ident),+ $(,)?]) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
        #[serde(default)]
        pub struct $name {
            $(pub $field: String,)+
        }

        impl TableRow for $name {
            const KIND: SubTableKind = $kind;
            const COLUMNS: &'static [&'static str] = &[$(stringify!($field)),+];

            fn from_cells(cells: &[String]) -> Self {
                let mut iter = cells.iter();
                Self {
                    $($field: iter.next().cloned().unwrap_or_default(),)+
                }
            }

            fn cells(&self) -> Vec<&str> {
                vec![$(self.$field.as_str()),+]
            }
        }
    };
}

table_row!(
    /// A chief complaint.
    ComplaintRow,
    SubTableKind::Complaints,
    [complaint, since, causes, severity]
);
table_row!(
    /// A current medication.
    MedicationRow,
    SubTableKind::Medications,
    [medication, since, effects]
);
table_row!(
    /// A current healthcare provider.
    HealthcareRow,
    SubTableKind::Healthcare,
    [provider, condition, treatment]
);
table_row!(
    /// A current therapy or treatment.
    TherapyRow,
    SubTableKind::Therapies,
    [therapy, since, results]
);
table_row!(
    /// Another injury or condition.
    InjuryRow,
    SubTableKind::Injuries,
    [injury, since, complications]
);
table_row!(
    /// A past operation.
    OperationRow,
    SubTableKind::Operations,
    [operation, when, complications]
);

/// Turn raw form cells into saved rows.
///
/// A row is saved only when its primary cell is non-empty after trimming.
/// Whitespace-only cells are stored as empty strings.
pub fn collect_rows<R: TableRow>(grid: &[Vec<String>]) -> Vec<R> {
    grid.iter()
        .filter_map(|row| {
            let cells: Vec<String> = row
                .iter()
                .map(|cell| {
                    if cell.trim().is_empty() {
                        String::new()
                    } else {
                        cell.clone()
                    }
                })
                .collect();
            let record = R::from_cells(&cells);
            if record.primary().is_empty() {
                None
            } else {
                Some(record)
            }
        })
        .collect()
}

/// All six sub-tables of a session.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionTables {
    pub complaints: Vec<ComplaintRow>,
    pub medications: Vec<MedicationRow>,
    pub healthcare: Vec<HealthcareRow>,
    pub therapies: Vec<TherapyRow>,
    pub injuries: Vec<InjuryRow>,
    pub operations: Vec<OperationRow>,
}

impl SessionTables {
    /// Rows of one kind as positional cells.
    pub fn cells(&self, kind: SubTableKind) -> Vec<Vec<String>> {
        fn owned<R: TableRow>(rows: &[R]) -> Vec<Vec<String>> {
            rows.iter()
                .map(|r| r.cells().into_iter().map(str::to_string).collect())
                .collect()
        }
        match kind {
            SubTableKind::Complaints => owned(&self.complaints),
            SubTableKind::Medications => owned(&self.medications),
            SubTableKind::Healthcare => owned(&self.healthcare),
            SubTableKind::Therapies => owned(&self.therapies),
            SubTableKind::Injuries => owned(&self.injuries),
            SubTableKind::Operations => owned(&self.operations),
        }
    }

    /// Rows of one kind whose primary column is filled in.
    pub fn filled_cells(&self, kind: SubTableKind) -> Vec<Vec<String>> {
        self.cells(kind)
            .into_iter()
            .filter(|row| row.first().is_some_and(|c| !c.is_empty()))
            .collect()
    }

    /// Replace the rows of one kind from a form grid.
    pub fn set_from_grid(&mut self, kind: SubTableKind, grid: &[Vec<String>]) {
        match kind {
            SubTableKind::Complaints => self.complaints = collect_rows(grid),
            SubTableKind::Medications => self.medications = collect_rows(grid),
            SubTableKind::Healthcare => self.healthcare = collect_rows(grid),
            SubTableKind::Therapies => self.therapies = collect_rows(grid),
            SubTableKind::Injuries => self.injuries = collect_rows(grid),
            SubTableKind::Operations => self.operations = collect_rows(grid),
        }
    }
}

/// Editable grid backing one sub-table on a form.
///
/// Always holds at least one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableGrid {
    kind: SubTableKind,
    rows: Vec<Vec<String>>,
}

impl TableGrid {
    /// A grid with exactly one blank row.
    pub fn blank(kind: SubTableKind) -> Self {
        Self {
            kind,
            rows: vec![Self::blank_row(kind)],
        }
    }

    /// A grid pre-filled from saved rows; one blank row if there are none.
    pub fn from_cells(kind: SubTableKind, cells: Vec<Vec<String>>) -> Self {
        if cells.is_empty() {
            return Self::blank(kind);
        }
        let width = kind.columns().len();
        let rows = cells
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();
        Self { kind, rows }
    }

    fn blank_row(kind: SubTableKind) -> Vec<String> {
        vec![String::new(); kind.columns().len()]
    }

    pub fn kind(&self) -> SubTableKind {
        self.kind
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Append a blank row.
    pub fn add_row(&mut self) {
        self.rows.push(Self::blank_row(self.kind));
    }

    /// Remove a row; the last remaining row is cleared instead.
    pub fn remove_row(&mut self, index: usize) {
        if index >= self.rows.len() {
            return;
        }
        if self.rows.len() > 1 {
            self.rows.remove(index);
        } else {
            self.rows[0] = Self::blank_row(self.kind);
        }
    }

    /// Set one cell; out-of-range positions are ignored.
    pub fn set_cell(&mut self, row: usize, column: usize, value: impl Into<String>) {
        if let Some(cell) = self.rows.get_mut(row).and_then(|r| r.get_mut(column)) {
            *cell = value.into();
        }
    }

    /// True when every cell is blank.
    pub fn is_blank(&self) -> bool {
        self.rows
            .iter()
            .all(|row| row.iter().all(|c| c.trim().is_empty()))
    }
}
