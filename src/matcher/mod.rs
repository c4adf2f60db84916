//! Resolves the health declaration belonging to a registration.
//!
//! Declarations created by this backend carry an explicit `registration_id`.
//! Historical rows do not, and their `participant_id` column holds either a
//! participant id or a registration id. The resolver walks a fixed ladder of
//! strategies and reports which one matched so that drifted rows can be
//! found and migrated.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::models::HealthDeclaration;

static DIGIT_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{4,}").expect("DIGIT_RUN should compile"));

/// Any digit run; declaration fields are compared by their first one.
static FIRST_DIGIT_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+").expect("FIRST_DIGIT_RUN should compile"));

static UUID_SHAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
        .expect("UUID_SHAPE should compile")
});

/// Minimum fragment length (exclusive) considered by the fragment strategy.
const MIN_FRAGMENT_LEN: usize = 4;

/// Strategy that resolved a declaration, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchStrategy {
    /// `participant_id` equals the registration's real participant.
    Participant,
    /// `registration_id` equals the registration id.
    RegistrationField,
    /// `participant_id` holds the registration id.
    ReversedField,
    /// A `-`/`_` fragment of the registration id appears in `participant_id`.
    TokenFragment,
    /// One id contains the other.
    Substring,
    /// The registration id's first run of four or more digits equals the
    /// first digit run of a declaration field.
    NumericFragment,
    /// Both ids embed the same UUID.
    UuidFragment,
}

impl MatchStrategy {
    /// Whether the match is keyed on the registration itself.
    ///
    /// A participant match is not exact: with several registrations the
    /// participant's first declaration wins, whichever registration it was
    /// created for.
    pub fn is_exact(&self) -> bool {
        matches!(
            self,
            MatchStrategy::RegistrationField | MatchStrategy::ReversedField
        )
    }
}

/// A resolved declaration and how it was found.
#[derive(Debug, Clone, Copy)]
pub struct DeclarationMatch<'a> {
    pub declaration: &'a HealthDeclaration,
    pub strategy: MatchStrategy,
}

/// Find the declaration for `registration_id`.
///
/// `participant_id` is the registration's participant as resolved from the
/// database, or `None` when the registration itself could not be loaded.
/// Returns `None` when no declaration exists yet.
pub fn find_declaration_for_registration<'a>(
    registration_id: &str,
    participant_id: Option<&str>,
    declarations: &'a [HealthDeclaration],
) -> Option<DeclarationMatch<'a>> {
    let found = |declaration, strategy| {
        Some(DeclarationMatch {
            declaration,
            strategy,
        })
    };

    if let Some(participant_id) = participant_id.filter(|p| !p.is_empty()) {
        if let Some(d) = declarations
            .iter()
            .find(|d| d.participant_id == participant_id)
        {
            return found(d, MatchStrategy::Participant);
        }
    }

    if registration_id.is_empty() {
        return None;
    }

    if let Some(d) = declarations
        .iter()
        .find(|d| d.registration_id.as_deref() == Some(registration_id))
    {
        return found(d, MatchStrategy::RegistrationField);
    }

    if let Some(d) = declarations
        .iter()
        .find(|d| d.participant_id == registration_id)
    {
        return found(d, MatchStrategy::ReversedField);
    }

    for fragment in registration_id
        .split(['-', '_'])
        .filter(|f| f.len() > MIN_FRAGMENT_LEN)
    {
        if let Some(d) = declarations
            .iter()
            .find(|d| d.participant_id.contains(fragment))
        {
            return found(d, MatchStrategy::TokenFragment);
        }
    }

    if let Some(d) = declarations.iter().find(|d| {
        linked_ids(d).any(|id| id.contains(registration_id) || registration_id.contains(id))
    }) {
        return found(d, MatchStrategy::Substring);
    }

    if let Some(digits) = first_match(&DIGIT_RUN, registration_id) {
        if let Some(d) = declarations
            .iter()
            .find(|d| linked_ids(d).any(|id| first_match(&FIRST_DIGIT_RUN, id) == Some(digits)))
        {
            return found(d, MatchStrategy::NumericFragment);
        }
    }

    if let Some(uuid) = first_match(&UUID_SHAPE, registration_id) {
        if let Some(d) = declarations.iter().find(|d| {
            linked_ids(d).any(|id| {
                first_match(&UUID_SHAPE, id).is_some_and(|other| other.eq_ignore_ascii_case(uuid))
            })
        }) {
            return found(d, MatchStrategy::UuidFragment);
        }
    }

    None
}

/// Non-empty identifier columns of a declaration.
fn linked_ids(declaration: &HealthDeclaration) -> impl Iterator<Item = &str> {
    std::iter::once(declaration.participant_id.as_str())
        .chain(declaration.registration_id.as_deref())
        .filter(|id| !id.is_empty())
}

fn first_match<'t>(pattern: &Regex, haystack: &'t str) -> Option<&'t str> {
    pattern.find(haystack).map(|m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FormStatus;

    fn declaration(
        id: &str,
        participant_id: &str,
        registration_id: Option<&str>,
    ) -> HealthDeclaration {
        HealthDeclaration {
            id: id.to_string(),
            participant_id: participant_id.to_string(),
            registration_id: registration_id.map(str::to_string),
            token: format!("token-{}", id),
            form_status: FormStatus::Signed,
            submission_date: None,
            notes: None,
            signature: None,
            parent_name: None,
            parent_id_number: None,
            created_at: "2025-01-01T00:00:00Z".to_string(),
            updated_at: "2025-01-01T00:00:00Z".to_string(),
        }
    }

    fn resolve<'a>(
        registration_id: &str,
        participant_id: Option<&str>,
        declarations: &'a [HealthDeclaration],
    ) -> Option<(&'a str, MatchStrategy)> {
        find_declaration_for_registration(registration_id, participant_id, declarations)
            .map(|m| (m.declaration.id.as_str(), m.strategy))
    }

    #[test]
    fn test_participant_match_wins() {
        let declarations = vec![
            declaration("by-registration", "someone-else", Some("reg-1")),
            declaration("by-participant", "participant-7", None),
        ];
        assert_eq!(
            resolve("reg-1", Some("participant-7"), &declarations),
            Some(("by-participant", MatchStrategy::Participant))
        );
    }

    #[test]
    fn test_direct_field_beats_substring() {
        let declarations = vec![
            declaration("substring", "reg-100", None),
            declaration("direct", "unrelated", Some("reg-1000")),
        ];
        assert_eq!(
            resolve("reg-1000", None, &declarations),
            Some(("direct", MatchStrategy::RegistrationField))
        );
    }

    #[test]
    fn test_reversed_field() {
        let declarations = vec![declaration("legacy", "reg-42", None)];
        assert_eq!(
            resolve("reg-42", Some("participant-1"), &declarations),
            Some(("legacy", MatchStrategy::ReversedField))
        );
    }

    #[test]
    fn test_token_fragment_scans_registration_fragments_first() {
        let declarations = vec![
            declaration("second", "xx-bravo-yy", None),
            declaration("first", "xx-alpha-yy", None),
        ];
        // "alpha" is the first long fragment of the registration id.
        assert_eq!(
            resolve("ab_alpha-bravo", None, &declarations),
            Some(("first", MatchStrategy::TokenFragment))
        );
    }

    #[test]
    fn test_short_fragments_are_ignored() {
        let declarations = vec![declaration("short", "zz-abcd-zz", None)];
        assert_eq!(resolve("abcd-ef", None, &declarations), None);
    }

    #[test]
    fn test_mutual_substring() {
        let declarations = vec![declaration("prefixed", "old:reg9", None)];
        assert_eq!(
            resolve("reg9", None, &declarations),
            Some(("prefixed", MatchStrategy::Substring))
        );

        let declarations = vec![declaration("contained", "abc", Some("x"))];
        assert_eq!(
            resolve("zabcz", None, &declarations),
            Some(("contained", MatchStrategy::Substring))
        );
    }

    #[test]
    fn test_empty_ids_never_match_by_substring() {
        let declarations = vec![declaration("blank", "", Some(""))];
        assert_eq!(resolve("reg-1", None, &declarations), None);
        assert_eq!(resolve("", None, &declarations), None);
    }

    #[test]
    fn test_numeric_fragment() {
        let declarations = vec![declaration("numeric", "P#2024.a", Some("R 12345 b"))];
        assert_eq!(
            resolve("reg#12345", None, &declarations),
            Some(("numeric", MatchStrategy::NumericFragment))
        );
    }

    #[test]
    fn test_numeric_fragment_compares_first_digit_run_of_declaration() {
        // The field's first run is "7", so the later "12345" does not count.
        let declarations = vec![declaration("later-run", "P7-12345", None)];
        assert_eq!(resolve("R12345", None, &declarations), None);

        let declarations = vec![declaration("first-run", "P12345-7", None)];
        assert_eq!(
            resolve("R12345", None, &declarations),
            Some(("first-run", MatchStrategy::NumericFragment))
        );
    }

    #[test]
    fn test_uuid_fragment() {
        // No run of four digits, so the numeric strategy stays out of the way.
        let uuid = "ABCDEF12-ABCD-4BCD-8BCD-ABCDEFABCDE1";
        let declarations = vec![declaration("uuid", &format!("legacy:{}", uuid), None)];
        // Lower-cased and wrapped differently: only the UUID strategy can see it.
        let registration_id = format!("r:{}:x", uuid.to_lowercase());
        assert_eq!(
            resolve(&registration_id, None, &declarations),
            Some(("uuid", MatchStrategy::UuidFragment))
        );
    }

    #[test]
    fn test_exhaustion_returns_none() {
        let declarations = vec![
            declaration("a", "participant-1", Some("reg-aaaa")),
            declaration("b", "participant-2", None),
        ];
        assert!(find_declaration_for_registration("zzz", Some("nobody"), &declarations).is_none());
        assert!(find_declaration_for_registration("reg-1", None, &[]).is_none());
    }

    #[test]
    fn test_exact_strategies() {
        assert!(MatchStrategy::RegistrationField.is_exact());
        assert!(MatchStrategy::ReversedField.is_exact());
        assert!(!MatchStrategy::Participant.is_exact());
        assert!(!MatchStrategy::Substring.is_exact());
    }

    #[test]
    fn test_participant_match_for_sibling_registration_is_not_exact() {
        let declarations = vec![
            declaration("for-a", "participant-7", Some("reg-a")),
            declaration("for-b", "participant-7", Some("reg-b")),
        ];
        let m = find_declaration_for_registration("reg-b", Some("participant-7"), &declarations)
            .unwrap();
        assert_eq!(m.declaration.id, "for-a");
        assert_eq!(m.strategy, MatchStrategy::Participant);
        assert!(!m.strategy.is_exact());
    }
}
