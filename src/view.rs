use crate::models::{Contact, SortOrder};
use std::cmp::Reverse;

pub fn derive_view(contacts: &[Contact], search_query: &str, sort_order: SortOrder) -> Vec<Contact> {
    let mut visible = filter_contacts(contacts, search_query);
    sort_contacts(&mut visible, sort_order);
    visible
}

/// A blank query keeps every contact. Otherwise the query is matched verbatim
/// (case-insensitively) against name, phone number and email.
pub fn filter_contacts(contacts: &[Contact], search_query: &str) -> Vec<Contact> {
    if search_query.trim().is_empty() {
        return contacts.to_vec();
    }

    let needle = search_query.to_lowercase();
    contacts
        .iter()
        .filter(|contact| matches_query(contact, &needle))
        .cloned()
        .collect()
}

fn matches_query(contact: &Contact, needle: &str) -> bool {
    contains_ignore_case(&contact.name, needle)
        || contains_ignore_case(&contact.phone_number, needle)
        || contact
            .email
            .as_deref()
            .map(|email| contains_ignore_case(email, needle))
            .unwrap_or(false)
}

fn contains_ignore_case(haystack: &str, lowered_needle: &str) -> bool {
    haystack.to_lowercase().contains(lowered_needle)
}

/// Stable sort on the lowercased name; equal names keep their relative order
/// in both directions.
pub fn sort_contacts(contacts: &mut [Contact], sort_order: SortOrder) {
    match sort_order {
        SortOrder::Ascending => contacts.sort_by_cached_key(|contact| contact.name.to_lowercase()),
        SortOrder::Descending => {
            contacts.sort_by_cached_key(|contact| Reverse(contact.name.to_lowercase()))
        }
    }
}
