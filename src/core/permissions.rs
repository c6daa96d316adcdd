//! Static role to permission mapping.

use crate::core::errors::PayError;
use crate::core::models::user::{Role, User};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Permission {
    CreatePaymentRequest,
    ManageQrCodes,
    ManageWallet,
    RequestSettlement,
    ManageMerchantProfile,
    ApproveSettlement,
    ReviewKyc,
    ManageFees,
    RefundTransaction,
    ViewAuditLog,
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

const USER_PERMISSIONS: &[Permission] = &[
    Permission::CreatePaymentRequest,
    Permission::ManageQrCodes,
    Permission::ManageWallet,
];

const MERCHANT_PERMISSIONS: &[Permission] = &[
    Permission::CreatePaymentRequest,
    Permission::ManageQrCodes,
    Permission::ManageWallet,
    Permission::RequestSettlement,
    Permission::ManageMerchantProfile,
];

const ADMIN_PERMISSIONS: &[Permission] = &[
    Permission::CreatePaymentRequest,
    Permission::ManageQrCodes,
    Permission::ManageWallet,
    Permission::RequestSettlement,
    Permission::ManageMerchantProfile,
    Permission::ApproveSettlement,
    Permission::ReviewKyc,
    Permission::ManageFees,
    Permission::RefundTransaction,
    Permission::ViewAuditLog,
];

impl Role {
    pub fn permissions(self) -> &'static [Permission] {
        match self {
            Role::User => USER_PERMISSIONS,
            Role::Merchant => MERCHANT_PERMISSIONS,
            Role::Admin => ADMIN_PERMISSIONS,
        }
    }

    pub fn can(self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }
}

pub fn require(user: &User, permission: Permission) -> Result<(), PayError> {
    if user.role.can(permission) {
        Ok(())
    } else {
        Err(PayError::Forbidden(user.id.clone(), permission.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_admins_move_settlements() {
        assert!(Role::Admin.can(Permission::ApproveSettlement));
        assert!(!Role::Merchant.can(Permission::ApproveSettlement));
        assert!(!Role::User.can(Permission::ApproveSettlement));
    }

    #[test]
    fn merchants_request_settlements_users_do_not() {
        assert!(Role::Merchant.can(Permission::RequestSettlement));
        assert!(!Role::User.can(Permission::RequestSettlement));
    }

    #[test]
    fn every_role_is_a_subset_of_admin() {
        for role in [Role::User, Role::Merchant] {
            for permission in role.permissions() {
                assert!(Role::Admin.can(*permission), "{} missing {}", role, permission);
            }
        }
    }
}
