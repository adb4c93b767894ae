//! Filter Compiler: turns the optional search fields of a contact search into a
//! storage-agnostic list of clauses. Clauses are AND'ed together; the
//! conditions inside one clause are OR'ed. The first clause of every
//! `ContactFilter` is the owner scope, so a compiled filter can never reach
//! rows of another user.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::identity::Identity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactField {
    Owner,
    FirstName,
    LastName,
    Email,
    Phone,
}

impl ContactField {
    pub fn column(&self) -> &'static str {
        match self {
            ContactField::Owner => "owner_username",
            ContactField::FirstName => "first_name",
            ContactField::LastName => "last_name",
            ContactField::Email => "email",
            ContactField::Phone => "phone",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equals,
    /// Unanchored substring match.
    Contains,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub field: ContactField,
    pub operator: Operator,
    pub value: String,
}

impl Condition {
    pub fn equals(field: ContactField, value: impl Into<String>) -> Self {
        Self { field, operator: Operator::Equals, value: value.into() }
    }
    pub fn contains(field: ContactField, value: impl Into<String>) -> Self {
        Self { field, operator: Operator::Contains, value: value.into() }
    }
}

/// Disjunction of conditions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clause {
    pub any_of: Vec<Condition>,
}

impl Clause {
    pub fn single(cond: Condition) -> Self { Self { any_of: vec![cond] } }
}

/// Sparse search request; `None` means "do not filter on this field".
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ContactSearch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Owner-scoped conjunctive filter over contacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContactFilter {
    clauses: Vec<Clause>,
}

impl ContactFilter {
    pub(crate) fn owned_by(owner: impl Into<String>) -> Self {
        Self { clauses: vec![Clause::single(Condition::equals(ContactField::Owner, owner))] }
    }

    fn and(mut self, clause: Clause) -> Self {
        self.clauses.push(clause);
        self
    }

    pub fn clauses(&self) -> &[Clause] { &self.clauses }
}

/// Phone numbers are stored whitespace-free, so a spaced query is compacted first.
pub fn normalize_phone(raw: &str) -> String {
    if raw.chars().any(char::is_whitespace) {
        raw.chars().filter(|c| !c.is_whitespace()).collect()
    } else {
        raw.to_string()
    }
}

pub fn compile(who: &Identity, search: &ContactSearch) -> ContactFilter {
    let mut filter = ContactFilter::owned_by(who.username.as_str());
    if let Some(name) = &search.name {
        filter = filter.and(Clause {
            any_of: vec![
                Condition::contains(ContactField::FirstName, name.as_str()),
                Condition::contains(ContactField::LastName, name.as_str()),
            ],
        });
    }
    if let Some(email) = &search.email {
        filter = filter.and(Clause::single(Condition::contains(ContactField::Email, email.as_str())));
    }
    if let Some(phone) = &search.phone {
        filter = filter.and(Clause::single(Condition::contains(ContactField::Phone, normalize_phone(phone))));
    }
    filter
}

impl Display for Condition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let op = match self.operator { Operator::Equals => "=", Operator::Contains => "CONTAINS" };
        write!(f, "{} {} {:?}", self.field.column(), op, self.value)
    }
}

impl Display for ContactFilter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (i, clause) in self.clauses.iter().enumerate() {
            if i > 0 { write!(f, " AND ")?; }
            if clause.any_of.len() > 1 { write!(f, "(")?; }
            for (j, cond) in clause.any_of.iter().enumerate() {
                if j > 0 { write!(f, " OR ")?; }
                write!(f, "{}", cond)?;
            }
            if clause.any_of.len() > 1 { write!(f, ")")?; }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn who(name: &str) -> Identity {
        Identity { username: name.into(), full_name: name.into(), token: "t".into() }
    }

    #[test]
    fn empty_search_is_owner_scope_only() {
        let f = compile(&who("u1"), &ContactSearch::default());
        assert_eq!(f.clauses().len(), 1);
        assert_eq!(f.clauses()[0].any_of, vec![Condition::equals(ContactField::Owner, "u1")]);
        assert_eq!(f.to_string(), "owner_username = \"u1\"");
    }

    #[test]
    fn name_matches_first_or_last() {
        let s = ContactSearch { name: Some("chel".into()), ..Default::default() };
        let f = compile(&who("u1"), &s);
        assert_eq!(f.clauses().len(), 2);
        let name = &f.clauses()[1];
        assert_eq!(name.any_of.len(), 2);
        assert_eq!(name.any_of[0], Condition::contains(ContactField::FirstName, "chel"));
        assert_eq!(name.any_of[1], Condition::contains(ContactField::LastName, "chel"));
    }

    #[test]
    fn all_fields_are_anded() {
        let s = ContactSearch {
            name: Some("a".into()),
            email: Some("@mail".into()),
            phone: Some("0812".into()),
        };
        let f = compile(&who("u1"), &s);
        assert_eq!(
            f.to_string(),
            "owner_username = \"u1\" AND (first_name CONTAINS \"a\" OR last_name CONTAINS \"a\") \
             AND email CONTAINS \"@mail\" AND phone CONTAINS \"0812\""
        );
    }

    #[test]
    fn spaced_phone_is_compacted() {
        let s = ContactSearch { phone: Some("696 9696".into()), ..Default::default() };
        let f = compile(&who("u1"), &s);
        assert_eq!(f.clauses()[1].any_of[0].value, "6969696");
        assert_eq!(normalize_phone("+62 812\t3456 789"), "+628123456789");
        assert_eq!(normalize_phone("0812-3456"), "0812-3456");
    }

    #[test]
    fn empty_string_is_still_a_predicate() {
        // absence and "" are different; the HTTP layer drops empty values before this point
        let s = ContactSearch { email: Some(String::new()), ..Default::default() };
        assert_eq!(compile(&who("u1"), &s).clauses().len(), 2);
    }
}
