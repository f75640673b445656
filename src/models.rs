use serde::{Deserialize, Serialize};

/// Identity value meaning "not yet persisted".
pub const UNSAVED_CONTACT_ID: i64 = 0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: i64,
    pub name: String,
    pub phone_number: String,
    pub email: Option<String>,
}

impl Contact {
    pub fn new(name: impl Into<String>, phone_number: impl Into<String>, email: Option<String>) -> Self {
        Self {
            id: UNSAVED_CONTACT_ID,
            name: name.into(),
            phone_number: phone_number.into(),
            email,
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.id != UNSAVED_CONTACT_ID
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn toggled(self) -> Self {
        match self {
            Self::Ascending => Self::Descending,
            Self::Descending => Self::Ascending,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppTheme {
    #[default]
    Default,
    Orange,
    Teal,
}

impl AppTheme {
    /// Declaration order, which is also the cycling order.
    pub const ALL: [AppTheme; 3] = [Self::Default, Self::Orange, Self::Teal];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "DEFAULT",
            Self::Orange => "ORANGE",
            Self::Teal => "TEAL",
        }
    }

    /// Unknown names fall back to [`AppTheme::Default`].
    pub fn from_name(raw: &str) -> Self {
        match raw {
            "ORANGE" => Self::Orange,
            "TEAL" => Self::Teal,
            _ => Self::Default,
        }
    }

    pub fn next(self) -> Self {
        let position = Self::ALL
            .iter()
            .position(|theme| *theme == self)
            .unwrap_or(0);
        Self::ALL[(position + 1) % Self::ALL.len()]
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewPreferences {
    pub theme: AppTheme,
    pub is_grid_layout: bool,
}

/// In-progress edit buffer for the add/edit dialog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditDraft {
    pub name: String,
    pub phone_number: String,
    pub email: String,
    pub edit_target: Option<Contact>,
}

impl EditDraft {
    pub fn for_contact(contact: &Contact) -> Self {
        Self {
            name: contact.name.clone(),
            phone_number: contact.phone_number.clone(),
            email: contact.email.clone().unwrap_or_default(),
            edit_target: Some(contact.clone()),
        }
    }

    pub fn edit_target_id(&self) -> Option<i64> {
        self.edit_target.as_ref().map(|contact| contact.id)
    }
}

/// Per-field validation messages; an empty string means "no error".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldErrors {
    pub name_error: String,
    pub phone_error: String,
    pub email_error: String,
}

impl FieldErrors {
    pub fn is_clear(&self) -> bool {
        self.name_error.is_empty() && self.phone_error.is_empty() && self.email_error.is_empty()
    }
}

/// Everything the presentation layer may observe at one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactListState {
    pub filtered_contacts: Vec<Contact>,
    pub search_query: String,
    pub sort_order: SortOrder,
    pub theme: AppTheme,
    pub is_grid_layout: bool,
    pub dialog_open: bool,
    pub draft: EditDraft,
    pub field_errors: FieldErrors,
    pub delete_confirm_open: bool,
    pub pending_deletion: Option<Contact>,
    pub storage_error: Option<String>,
}

impl ContactListState {
    pub fn name_to_delete(&self) -> &str {
        self.pending_deletion
            .as_ref()
            .map(|contact| contact.name.as_str())
            .unwrap_or("")
    }
}
