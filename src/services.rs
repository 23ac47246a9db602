/// Per-user service flags
///
/// Each dashboard feature is gated by one boolean column on the user.
/// Handlers declare the flag they need through the `ServiceAuth<S>`
/// extractor (see `auth.rs`) using the marker types below.
use crate::{
    db::account::User,
    error::{PanelError, PanelResult},
};
use serde::{Deserialize, Serialize};

/// Capability flags stored on every user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceFlag {
    Whatsapp,
    License,
    Email,
}

impl ServiceFlag {
    /// Column name on the users table
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceFlag::Whatsapp => "whatsapp_service",
            ServiceFlag::License => "license_service",
            ServiceFlag::Email => "email_service",
        }
    }

    /// Human readable name, e.g. `license_service` -> `License Service`
    pub fn display_name(&self) -> String {
        self.as_str()
            .split('_')
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Whether the user holds this flag
    pub fn is_enabled_for(&self, user: &User) -> bool {
        match self {
            ServiceFlag::Whatsapp => user.whatsapp_service,
            ServiceFlag::License => user.license_service,
            ServiceFlag::Email => user.email_service,
        }
    }

    /// Fail with `ServiceRequired` unless the user holds this flag
    pub fn check(&self, user: &User) -> PanelResult<()> {
        if self.is_enabled_for(user) {
            Ok(())
        } else {
            Err(PanelError::ServiceRequired(*self))
        }
    }
}

/// Flags of one user, as reported by the dashboard and admin endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceFlags {
    pub whatsapp_service: bool,
    pub license_service: bool,
    pub email_service: bool,
}

impl From<&User> for ServiceFlags {
    fn from(user: &User) -> Self {
        Self {
            whatsapp_service: user.whatsapp_service,
            license_service: user.license_service,
            email_service: user.email_service,
        }
    }
}

/// Partial update of service flags; `None` leaves a flag untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceUpdate {
    pub whatsapp_service: Option<bool>,
    pub license_service: Option<bool>,
    pub email_service: Option<bool>,
}

impl ServiceUpdate {
    pub fn is_empty(&self) -> bool {
        self.whatsapp_service.is_none() && self.license_service.is_none() && self.email_service.is_none()
    }

    pub fn apply(&self, current: ServiceFlags) -> ServiceFlags {
        ServiceFlags {
            whatsapp_service: self.whatsapp_service.unwrap_or(current.whatsapp_service),
            license_service: self.license_service.unwrap_or(current.license_service),
            email_service: self.email_service.unwrap_or(current.email_service),
        }
    }
}

/// Marker trait naming the flag a handler requires
pub trait RequiredService: Send + Sync + 'static {
    const FLAG: ServiceFlag;
}

/// Requires `whatsapp_service`
#[derive(Debug, Clone, Copy)]
pub struct WhatsappService;

/// Requires `license_service`
#[derive(Debug, Clone, Copy)]
pub struct LicenseService;

impl RequiredService for WhatsappService {
    const FLAG: ServiceFlag = ServiceFlag::Whatsapp;
}

impl RequiredService for LicenseService {
    const FLAG: ServiceFlag = ServiceFlag::License;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user_with(whatsapp: bool, license: bool, email: bool) -> User {
        User {
            id: 1,
            username: "ayse".to_string(),
            password_hash: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            email: None,
            is_active: true,
            is_staff: false,
            whatsapp_service: whatsapp,
            license_service: license,
            email_service: email,
            date_joined: Utc::now(),
            last_login: None,
        }
    }

    #[test]
    fn test_display_name() {
        assert_eq!(ServiceFlag::License.display_name(), "License Service");
        assert_eq!(ServiceFlag::Whatsapp.display_name(), "Whatsapp Service");
        assert_eq!(ServiceFlag::Email.display_name(), "Email Service");
    }

    #[test]
    fn test_flags_are_independent() {
        let user = user_with(false, true, false);
        assert!(ServiceFlag::License.check(&user).is_ok());
        assert!(matches!(
            ServiceFlag::Whatsapp.check(&user),
            Err(PanelError::ServiceRequired(ServiceFlag::Whatsapp))
        ));
        assert!(!ServiceFlag::Email.is_enabled_for(&user));
    }

    #[test]
    fn test_partial_update() {
        let current = ServiceFlags::from(&user_with(true, false, false));
        let update = ServiceUpdate {
            license_service: Some(true),
            ..Default::default()
        };
        let next = update.apply(current);
        assert!(next.whatsapp_service);
        assert!(next.license_service);
        assert!(!next.email_service);
        assert!(ServiceUpdate::default().is_empty());
    }
}
