use super::principal::{Principal, Subject};

/// Number of role principals granted to the subject. Users and groups do not count.
pub fn role_count(subject: &Subject) -> usize {
    subject.principals().filter(|p| p.is_role()).count()
}

/// A login only admits a session when it granted at least one role.
pub fn has_role(subject: &Subject) -> bool {
    subject.principals().any(Principal::is_role)
}
