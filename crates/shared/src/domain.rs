use std::{borrow::Cow, collections::BTreeMap, fmt, str::FromStr, sync::LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

id_newtype!(UserId);
id_newtype!(RowId);

/// Authenticated identity as returned by the identity service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl User {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

static EMAIL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\S+@\S+\.\S+").expect("Invalid email regex"));

/// Loose email shape check: some non-space text, `@`, more text, `.`, more text.
pub fn is_plausible_email(candidate: &str) -> bool {
    EMAIL_REGEX.is_match(candidate)
}

/// One record of a collection page. Every row carries an `id`; the remaining
/// fields are collection specific.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub id: RowId,
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

impl Row {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: RowId(id.into()),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Text shown in a table cell. Missing, null and empty values render as `-`.
    pub fn cell_text(&self, field: &str) -> Cow<'_, str> {
        if field == "id" {
            return if self.id.0.is_empty() {
                Cow::Borrowed("-")
            } else {
                Cow::Borrowed(self.id.0.as_str())
            };
        }

        match self.fields.get(field) {
            None | Some(Value::Null) => Cow::Borrowed("-"),
            Some(Value::String(text)) if text.is_empty() => Cow::Borrowed("-"),
            Some(Value::String(text)) => Cow::Borrowed(text.as_str()),
            Some(other) => Cow::Owned(other.to_string()),
        }
    }
}

/// Static column schema supplied by a view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub field: String,
    pub header_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sortable: Option<bool>,
}

impl Column {
    pub fn new(field: impl Into<String>, header_name: impl Into<String>, width: u16) -> Self {
        Self {
            field: field.into(),
            header_name: header_name.into(),
            width: Some(width),
            sortable: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CollectionView {
    Input,
    ArtifactOutput,
    ArtifactJobs,
    UserActivity,
    Profile,
}

impl CollectionView {
    pub const ALL: [CollectionView; 5] = [
        CollectionView::Input,
        CollectionView::ArtifactOutput,
        CollectionView::ArtifactJobs,
        CollectionView::UserActivity,
        CollectionView::Profile,
    ];

    pub fn slug(self) -> &'static str {
        match self {
            CollectionView::Input => "input",
            CollectionView::ArtifactOutput => "artifact-output",
            CollectionView::ArtifactJobs => "artifact-jobs",
            CollectionView::UserActivity => "user-activity",
            CollectionView::Profile => "profile",
        }
    }

    pub fn endpoint(self) -> &'static str {
        match self {
            CollectionView::Input => "/api/input",
            CollectionView::ArtifactOutput => "/api/artifact-output",
            CollectionView::ArtifactJobs => "/api/artifact-jobs",
            CollectionView::UserActivity => "/api/user-activity",
            CollectionView::Profile => "/api/profile",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            CollectionView::Input => "Input",
            CollectionView::ArtifactOutput => "Artifact Output",
            CollectionView::ArtifactJobs => "Artifact Jobs",
            CollectionView::UserActivity => "User Activity",
            CollectionView::Profile => "Profile",
        }
    }

    pub fn columns(self) -> Vec<Column> {
        let headers: [(&str, &str, u16); 4] = match self {
            CollectionView::Input => [
                ("id", "ID", 100),
                ("name", "Name", 200),
                ("status", "Status", 150),
                ("createdAt", "Created At", 200),
            ],
            CollectionView::ArtifactOutput => [
                ("id", "ID", 100),
                ("name", "Artifact Name", 250),
                ("status", "Status", 120),
                ("createdAt", "Generated At", 200),
            ],
            CollectionView::ArtifactJobs => [
                ("id", "Job ID", 120),
                ("name", "Job Name", 200),
                ("status", "Status", 120),
                ("createdAt", "Started At", 200),
            ],
            CollectionView::UserActivity => [
                ("id", "Activity ID", 120),
                ("name", "Activity", 250),
                ("status", "Status", 120),
                ("createdAt", "Timestamp", 200),
            ],
            CollectionView::Profile => [
                ("id", "Setting ID", 120),
                ("name", "Setting Name", 200),
                ("status", "Value", 150),
                ("createdAt", "Last Modified", 200),
            ],
        };
        headers
            .into_iter()
            .map(|(field, header, width)| Column::new(field, header, width))
            .collect()
    }

    pub fn from_endpoint(endpoint: &str) -> Option<Self> {
        let endpoint = endpoint.trim_end_matches('/');
        Self::ALL.into_iter().find(|view| view.endpoint() == endpoint)
    }
}

impl fmt::Display for CollectionView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

impl FromStr for CollectionView {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().trim_start_matches("/api/").to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|view| view.slug() == needle)
            .ok_or_else(|| format!("unknown collection '{s}'"))
    }
}
