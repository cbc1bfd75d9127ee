//! Role-based visibility rules.
//!
//! Every predicate is total: a missing user or record is always a deny,
//! never an error.

use serde::{Deserialize, Serialize};

use crate::error::AccessError;
use crate::identity::{email_domain, Role, User};
use crate::record::ProjectRecord;

/// Email domains that drive visibility independent of role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccessPolicy {
    /// Agency domains. Users on these see every project.
    pub internal_domains: Vec<String>,
    /// Partner domains. Users on these see projects without an internal
    /// channel, plus partnerships.
    pub partner_domains: Vec<String>,
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self {
            internal_domains: vec!["flyrank.com".to_string(), "powercommerce.com".to_string()],
            partner_domains: vec!["shopline.com".to_string()],
        }
    }
}

impl AccessPolicy {
    pub fn new<I, P, S>(internal_domains: I, partner_domains: P) -> Self
    where
        I: IntoIterator<Item = S>,
        P: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            internal_domains: normalize(internal_domains),
            partner_domains: normalize(partner_domains),
        }
    }

    pub fn is_internal_domain(&self, domain: &str) -> bool {
        self.internal_domains
            .iter()
            .any(|d| d.eq_ignore_ascii_case(domain))
    }

    pub fn is_partner_domain(&self, domain: &str) -> bool {
        self.partner_domains
            .iter()
            .any(|d| d.eq_ignore_ascii_case(domain))
    }

    /// Whether `record` is visible to `user`. First matching rule wins:
    ///
    /// 1. elevated role or internal domain: allow
    /// 2. partner domain: allow unless the project has an internal channel
    ///    and is not a partnership
    /// 3. merchant: allow only assigned projects
    /// 4. deny
    pub fn can_access(&self, user: Option<&User>, record: Option<&ProjectRecord>) -> bool {
        let (Some(user), Some(record)) = (user, record) else {
            return false;
        };
        let domain = user.email_domain();
        let domain = domain.as_deref().unwrap_or_default();

        if user.role.is_elevated() || (!domain.is_empty() && self.is_internal_domain(domain)) {
            return true;
        }
        if !domain.is_empty() && self.is_partner_domain(domain) {
            return !record.internal_channel_present() || record.is_partnership();
        }
        if user.role.is_restricted() {
            return user.is_assigned(&record.id);
        }
        false
    }

    /// Role the server assigns at sign-up based on the email domain.
    pub fn infer_role(&self, email: &str) -> Role {
        match email_domain(email) {
            Some(domain) if self.is_internal_domain(&domain) => Role::Internal,
            Some(domain) if self.is_partner_domain(&domain) => Role::Shopline,
            _ => Role::Merchant,
        }
    }

    /// Like [`AccessPolicy::can_access`] but with a reason on deny.
    pub fn ensure_access(
        &self,
        user: Option<&User>,
        record: &ProjectRecord,
    ) -> Result<(), AccessError> {
        if user.is_none() {
            return Err(AccessError::NotAuthenticated);
        }
        if self.can_access(user, Some(record)) {
            Ok(())
        } else {
            Err(AccessError::NotVisible {
                id: record.id.clone(),
            })
        }
    }
}

/// Elevated roles may edit project fields.
pub fn can_mutate(user: Option<&User>) -> bool {
    user.is_some_and(|u| u.role.is_elevated())
}

/// Only the top tier reaches settings, logs and user management.
pub fn can_reach_admin_area(user: Option<&User>) -> bool {
    user.is_some_and(|u| u.role == Role::Superadmin)
}

pub fn has_role(user: Option<&User>, roles: &[Role]) -> bool {
    user.is_some_and(|u| roles.contains(&u.role))
}

pub fn has_min_role(user: Option<&User>, min: Role) -> bool {
    user.is_some_and(|u| u.role != Role::Unknown && u.role.rank() >= min.rank())
}

pub fn can_view_internal_channel(user: Option<&User>) -> bool {
    has_role(user, &[Role::Superadmin, Role::Internal])
}

pub fn can_manage_users(user: Option<&User>) -> bool {
    can_reach_admin_area(user)
}

/// Fail with [`AccessError::Forbidden`] unless the user may edit projects.
pub fn ensure_can_mutate(user: Option<&User>) -> Result<(), AccessError> {
    match user {
        None => Err(AccessError::NotAuthenticated),
        Some(u) if can_mutate(Some(u)) => Ok(()),
        Some(u) => Err(AccessError::Forbidden {
            role: u.role,
            action: "edit projects".to_string(),
        }),
    }
}

/// Fail with [`AccessError::Forbidden`] unless the user is a superadmin.
pub fn ensure_admin(user: Option<&User>) -> Result<(), AccessError> {
    match user {
        None => Err(AccessError::NotAuthenticated),
        Some(u) if can_reach_admin_area(Some(u)) => Ok(()),
        Some(u) => Err(AccessError::Forbidden {
            role: u.role,
            action: "open the admin area".to_string(),
        }),
    }
}

fn normalize<I, S>(domains: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    domains
        .into_iter()
        .map(|d| d.into().trim().trim_start_matches('@').to_ascii_lowercase())
        .filter(|d| !d.is_empty())
        .collect()
}
