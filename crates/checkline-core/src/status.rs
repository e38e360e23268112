use serde::{Deserialize, Serialize};

/// What a status symbol means, independent of the symbol chosen for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    Incomplete,
    InProgress,
    Completed,
    Cancelled,
    Deferred,
    Important,
    Question,
}

/// One row of the status table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusOption {
    pub symbol: char,
    pub name: String,
    pub kind: StatusKind,
    /// Property stamped with today's date when this status is entered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,
    /// Keep the previous status's property when entering this one.
    #[serde(default)]
    pub preserve_old_prop: bool,
}

impl StatusOption {
    fn new(symbol: char, name: &str, kind: StatusKind, property: Option<&str>) -> Self {
        Self {
            symbol,
            name: name.to_string(),
            kind,
            property: property.map(str::to_string),
            preserve_old_prop: false,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.kind == StatusKind::Completed
    }
}

/// Ordered status table. Passed explicitly to every operation that needs it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusTable(Vec<StatusOption>);

impl Default for StatusTable {
    fn default() -> Self {
        let mut deferred = StatusOption::new('>', "Deferred", StatusKind::Deferred, Some("deferred"));
        deferred.preserve_old_prop = true;

        Self(vec![
            StatusOption::new(' ', "Todo", StatusKind::Incomplete, None),
            StatusOption::new('/', "In progress", StatusKind::InProgress, None),
            StatusOption::new('x', "Done", StatusKind::Completed, Some("completion")),
            StatusOption::new('X', "Done", StatusKind::Completed, Some("completion")),
            StatusOption::new('-', "Cancelled", StatusKind::Cancelled, Some("cancelled")),
            deferred,
            StatusOption::new('!', "Important", StatusKind::Important, None),
            StatusOption::new('?', "Question", StatusKind::Question, None),
        ])
    }
}

impl StatusTable {
    pub fn new(options: Vec<StatusOption>) -> Self {
        Self(options)
    }

    pub fn options(&self) -> &[StatusOption] {
        &self.0
    }

    pub fn get(&self, symbol: char) -> Option<&StatusOption> {
        self.0.iter().find(|option| option.symbol == symbol)
    }

    /// The open status every new occurrence starts in.
    pub fn incomplete_symbol(&self) -> char {
        self.0
            .iter()
            .find(|option| option.kind == StatusKind::Incomplete)
            .map(|option| option.symbol)
            .unwrap_or(' ')
    }

    /// First completed status in the table, used when completing a task.
    pub fn completed_symbol(&self) -> char {
        self.0
            .iter()
            .find(|option| option.is_completed())
            .map(|option| option.symbol)
            .unwrap_or('x')
    }

    pub fn is_completed(&self, symbol: char) -> bool {
        self.get(symbol).is_some_and(StatusOption::is_completed)
    }

    /// Every property name some status stamps, deduplicated, in table order.
    pub fn side_effect_properties(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for name in self.0.iter().filter_map(|option| option.property.as_deref()) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// Cycle to the following status. Unknown symbols restart at the top.
    pub fn next_after(&self, symbol: char) -> char {
        match self.0.iter().position(|option| option.symbol == symbol) {
            Some(index) => self.0[(index + 1) % self.0.len()].symbol,
            None => self.0.first().map(|option| option.symbol).unwrap_or(' '),
        }
    }
}
