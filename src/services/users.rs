use std::{
    collections::{BTreeSet, HashMap},
    ops::RangeInclusive,
    sync::Arc,
};

use parking_lot::RwLock;
use tracing::info;

use crate::{
    error::{CredentialError, UserError},
    models::user::{Role, RoleName, User, UserRegistrationRequest, UserUpdateRequest},
};

const MIN_PASSWORD_LEN: usize = 8;
const MAX_PASSWORD_LEN: usize = 35;
const MAX_INVITE_CODE_LEN: usize = 100;
const NAME_LEN: RangeInclusive<usize> = 3..=30;
const SHIPPING_ADDRESS_LEN: RangeInclusive<usize> = 10..=150;

/// Verifies an identifier/secret pair and returns the matching user.
pub trait CredentialVerifier: Send + Sync {
    fn verify(&self, email: &str, password: &str) -> Result<User, CredentialError>;
}

pub trait PrincipalLookup: Send + Sync {
    fn find_by_email(&self, email: &str) -> Option<User>;
}

pub trait RoleLookup: Send + Sync {
    fn find_by_name(&self, name: RoleName) -> Option<Role>;
}

/// Role records keyed by name. Deletion is soft: deleted roles stop
/// resolving but keep their id.
#[derive(Debug)]
pub struct RoleRepository {
    roles: RwLock<HashMap<RoleName, (Role, bool)>>,
}

impl Default for RoleRepository {
    fn default() -> Self {
        let roles = [(1, RoleName::User), (2, RoleName::Admin)]
            .into_iter()
            .map(|(id, name)| (name, (Role { id, name }, false)))
            .collect();
        Self { roles: RwLock::new(roles) }
    }
}

impl RoleRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delete(&self, name: RoleName) {
        if let Some(entry) = self.roles.write().get_mut(&name) {
            entry.1 = true;
        }
    }
}

impl RoleLookup for RoleRepository {
    fn find_by_name(&self, name: RoleName) -> Option<Role> {
        self.roles
            .read()
            .get(&name)
            .filter(|(_, deleted)| !deleted)
            .map(|(role, _)| role.clone())
    }
}

/// Who may register with the ADMIN role, and with which invite code.
#[derive(Debug, Clone, Default)]
pub struct AdminGrant {
    pub email: Option<String>,
    pub invite_code: Option<String>,
}

/// In-memory user registry. Passwords are stored as bcrypt hashes.
pub struct UserDirectory {
    users: RwLock<HashMap<String, User>>,
    roles: Arc<dyn RoleLookup>,
    admin: AdminGrant,
    bcrypt_cost: u32,
}

impl UserDirectory {
    pub fn new(roles: Arc<dyn RoleLookup>, admin: AdminGrant, bcrypt_cost: u32) -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            roles,
            admin,
            bcrypt_cost,
        }
    }

    pub fn register(&self, req: UserRegistrationRequest) -> Result<User, UserError> {
        validate_registration(&req)?;
        let email = req.email.trim().to_lowercase();
        let roles = self.assign_roles(&email, req.invite_code.as_deref())?;
        let password_hash =
            bcrypt::hash(&req.password, self.bcrypt_cost).map_err(|_| UserError::Hashing)?;

        let mut users = self.users.write();
        if users.contains_key(&email) {
            return Err(UserError::AlreadyExists(email));
        }
        let user = User {
            id: users.len() as i64 + 1,
            email: email.clone(),
            password_hash,
            first_name: req.first_name.trim().to_string(),
            last_name: req.last_name.trim().to_string(),
            shipping_address: req.shipping_address.trim().to_string(),
            roles,
        };
        users.insert(email, user.clone());
        info!(user_id = user.id, "User registered");
        Ok(user)
    }

    /// Applies the fields present in `req` to the user's profile.
    pub fn update(&self, email: &str, req: UserUpdateRequest) -> Result<User, UserError> {
        validate_update(&req)?;
        let email = email.trim().to_lowercase();
        let mut users = self.users.write();
        let user = users
            .get_mut(&email)
            .ok_or_else(|| UserError::NotFound(email.clone()))?;
        if let Some(first_name) = req.first_name {
            user.first_name = first_name.trim().to_string();
        }
        if let Some(last_name) = req.last_name {
            user.last_name = last_name.trim().to_string();
        }
        if let Some(shipping_address) = req.shipping_address {
            user.shipping_address = shipping_address.trim().to_string();
        }
        info!(user_id = user.id, "User profile updated");
        Ok(user.clone())
    }

    pub fn add_role(&self, email: &str, role: RoleName) -> Result<User, UserError> {
        let email = email.trim().to_lowercase();
        let mut users = self.users.write();
        let user = users
            .get_mut(&email)
            .ok_or_else(|| UserError::NotFound(email.clone()))?;
        if user.has_role(role) {
            return Err(UserError::AlreadyHasRole(email, role));
        }
        self.roles
            .find_by_name(role)
            .ok_or(UserError::RoleNotFound(role))?;
        user.roles.insert(role);
        info!(user_id = user.id, %role, "Role granted");
        Ok(user.clone())
    }

    fn assign_roles(
        &self,
        email: &str,
        invite_code: Option<&str>,
    ) -> Result<BTreeSet<RoleName>, UserError> {
        let mut roles = BTreeSet::from([RoleName::User]);
        let is_admin_email = self
            .admin
            .email
            .as_deref()
            .is_some_and(|admin| admin.eq_ignore_ascii_case(email));
        if is_admin_email {
            if invite_code.is_none() || invite_code != self.admin.invite_code.as_deref() {
                return Err(UserError::IncorrectInviteCode(
                    invite_code.unwrap_or_default().to_string(),
                ));
            }
            roles.insert(RoleName::Admin);
        }
        for role in &roles {
            self.roles
                .find_by_name(*role)
                .ok_or(UserError::RoleNotFound(*role))?;
        }
        Ok(roles)
    }
}

impl CredentialVerifier for UserDirectory {
    fn verify(&self, email: &str, password: &str) -> Result<User, CredentialError> {
        let user = self
            .find_by_email(email)
            .ok_or(CredentialError::BadCredentials)?;
        let valid = bcrypt::verify(password, &user.password_hash)
            .map_err(|_| CredentialError::BadCredentials)?;
        if !valid {
            return Err(CredentialError::BadCredentials);
        }
        Ok(user)
    }
}

impl PrincipalLookup for UserDirectory {
    fn find_by_email(&self, email: &str) -> Option<User> {
        self.users.read().get(&email.trim().to_lowercase()).cloned()
    }
}

fn validate_registration(req: &UserRegistrationRequest) -> Result<(), UserError> {
    let email = req.email.trim();
    let looks_like_email = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !looks_like_email {
        return Err(UserError::Validation("email must be a valid email address".into()));
    }
    let len = req.password.chars().count();
    if !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&len) {
        return Err(UserError::Validation(format!(
            "password must be between {MIN_PASSWORD_LEN} and {MAX_PASSWORD_LEN} characters"
        )));
    }
    if req.password != req.repeat_password {
        return Err(UserError::Validation(
            "password and repeatPassword fields are not matching".into(),
        ));
    }
    if req.first_name.trim().is_empty() {
        return Err(UserError::Validation("firstName must not be blank".into()));
    }
    if req.last_name.trim().is_empty() {
        return Err(UserError::Validation("lastName must not be blank".into()));
    }
    if req.shipping_address.trim().is_empty() {
        return Err(UserError::Validation("shippingAddress must not be blank".into()));
    }
    if req
        .invite_code
        .as_ref()
        .is_some_and(|code| code.chars().count() > MAX_INVITE_CODE_LEN)
    {
        return Err(UserError::Validation(format!(
            "inviteCode must be at most {MAX_INVITE_CODE_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_update(req: &UserUpdateRequest) -> Result<(), UserError> {
    let fields = [
        ("firstName", &req.first_name, NAME_LEN),
        ("lastName", &req.last_name, NAME_LEN),
        ("shippingAddress", &req.shipping_address, SHIPPING_ADDRESS_LEN),
    ];
    let any_filled = fields
        .iter()
        .any(|(_, value, _)| value.as_deref().is_some_and(|v| !v.trim().is_empty()));
    if !any_filled {
        return Err(UserError::InvalidUpdate("Please fill in at least one field".into()));
    }
    for (field, value, range) in fields {
        let Some(value) = value else { continue };
        if !range.contains(&value.trim().chars().count()) {
            return Err(UserError::InvalidUpdate(format!(
                "{field} length must be between {} and {}",
                range.start(),
                range.end()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> UserDirectory {
        UserDirectory::new(
            Arc::new(RoleRepository::new()),
            AdminGrant {
                email: Some("admin@example.com".into()),
                invite_code: Some("open-sesame".into()),
            },
            4,
        )
    }

    fn request(email: &str) -> UserRegistrationRequest {
        UserRegistrationRequest {
            email: email.into(),
            password: "password123".into(),
            repeat_password: "password123".into(),
            first_name: "Alice".into(),
            last_name: "Liddell".into(),
            shipping_address: "1 Rabbit Hole, Wonderland".into(),
            invite_code: None,
        }
    }

    #[test]
    fn test_register_then_verify_credentials() {
        let dir = directory();
        let user = dir.register(request("Alice@Example.com")).unwrap();
        assert_eq!(user.email, "alice@example.com");
        assert_eq!(user.role_names(), vec![RoleName::User]);
        assert_ne!(user.password_hash, "password123");

        assert!(dir.verify("alice@example.com", "password123").is_ok());
        assert_eq!(
            dir.verify("alice@example.com", "wrong-password").unwrap_err(),
            CredentialError::BadCredentials
        );
        assert_eq!(
            dir.verify("nobody@example.com", "password123").unwrap_err(),
            CredentialError::BadCredentials
        );
    }

    #[test]
    fn test_duplicate_email_is_rejected() {
        let dir = directory();
        dir.register(request("alice@example.com")).unwrap();
        assert_eq!(
            dir.register(request("alice@example.com")).unwrap_err(),
            UserError::AlreadyExists("alice@example.com".into())
        );
    }

    #[test]
    fn test_registration_validation() {
        let dir = directory();
        let mut req = request("alice@example.com");
        req.repeat_password = "different123".into();
        assert!(matches!(dir.register(req), Err(UserError::Validation(_))));

        let mut req = request("alice@example.com");
        req.password = "short".into();
        req.repeat_password = "short".into();
        assert!(matches!(dir.register(req), Err(UserError::Validation(_))));

        assert!(matches!(
            dir.register(request("not-an-email")),
            Err(UserError::Validation(_))
        ));

        let mut req = request("alice@example.com");
        req.shipping_address = "   ".into();
        assert!(matches!(dir.register(req), Err(UserError::Validation(_))));

        let mut req = request("alice@example.com");
        req.invite_code = Some("x".repeat(101));
        assert!(matches!(dir.register(req), Err(UserError::Validation(_))));

        let mut req = request("alice@example.com");
        req.invite_code = Some("x".repeat(100));
        assert!(dir.register(req).is_ok());
    }

    #[test]
    fn test_update_applies_present_fields_only() {
        let dir = directory();
        dir.register(request("alice@example.com")).unwrap();

        let user = dir
            .update(
                "Alice@Example.com",
                UserUpdateRequest {
                    first_name: Some("Alicia".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(user.first_name, "Alicia");
        assert_eq!(user.last_name, "Liddell");
        assert_eq!(user.shipping_address, "1 Rabbit Hole, Wonderland");
        assert_eq!(dir.find_by_email("alice@example.com").unwrap().first_name, "Alicia");
    }

    #[test]
    fn test_update_validation() {
        let dir = directory();
        dir.register(request("alice@example.com")).unwrap();

        let err = dir
            .update("alice@example.com", UserUpdateRequest::default())
            .unwrap_err();
        assert_eq!(err, UserError::InvalidUpdate("Please fill in at least one field".into()));

        let blank = UserUpdateRequest {
            last_name: Some("  ".into()),
            ..Default::default()
        };
        assert!(matches!(
            dir.update("alice@example.com", blank),
            Err(UserError::InvalidUpdate(_))
        ));

        let short_name = UserUpdateRequest {
            first_name: Some("Al".into()),
            ..Default::default()
        };
        assert!(matches!(
            dir.update("alice@example.com", short_name),
            Err(UserError::InvalidUpdate(_))
        ));

        let long_address = UserUpdateRequest {
            shipping_address: Some("x".repeat(151)),
            ..Default::default()
        };
        assert!(matches!(
            dir.update("alice@example.com", long_address),
            Err(UserError::InvalidUpdate(_))
        ));

        // A rejected update leaves the profile alone.
        let user = dir.find_by_email("alice@example.com").unwrap();
        assert_eq!(user.first_name, "Alice");

        let unknown = UserUpdateRequest {
            first_name: Some("Bob".into()),
            ..Default::default()
        };
        assert_eq!(
            dir.update("bob@example.com", unknown).unwrap_err(),
            UserError::NotFound("bob@example.com".into())
        );
    }

    #[test]
    fn test_admin_email_requires_invite_code() {
        let dir = directory();
        assert!(matches!(
            dir.register(request("admin@example.com")),
            Err(UserError::IncorrectInviteCode(_))
        ));

        let mut req = request("admin@example.com");
        req.invite_code = Some("open-sesame".into());
        let admin = dir.register(req).unwrap();
        assert!(admin.has_role(RoleName::Admin));
        assert!(admin.has_role(RoleName::User));
    }

    #[test]
    fn test_add_role() {
        let dir = directory();
        dir.register(request("alice@example.com")).unwrap();

        let user = dir.add_role("alice@example.com", RoleName::Admin).unwrap();
        assert!(user.has_role(RoleName::Admin));
        assert!(dir.find_by_email("alice@example.com").unwrap().has_role(RoleName::Admin));

        assert_eq!(
            dir.add_role("alice@example.com", RoleName::Admin).unwrap_err(),
            UserError::AlreadyHasRole("alice@example.com".into(), RoleName::Admin)
        );
        assert_eq!(
            dir.add_role("bob@example.com", RoleName::Admin).unwrap_err(),
            UserError::NotFound("bob@example.com".into())
        );
    }

    #[test]
    fn test_deleted_role_stops_resolving() {
        let roles = RoleRepository::new();
        assert_eq!(roles.find_by_name(RoleName::Admin).map(|r| r.id), Some(2));
        roles.delete(RoleName::Admin);
        assert!(roles.find_by_name(RoleName::Admin).is_none());
        assert!(roles.find_by_name(RoleName::User).is_some());
    }
}
