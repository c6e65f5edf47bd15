//! Resolves a storefront order's customer to an RMS customer id (§4.7).

use std::sync::Arc;

use crate::error::SyncError;
use crate::models::{NewCustomer, StorefrontAddress, StorefrontCustomer};
use crate::store::RmsStore;

#[derive(Debug, Clone)]
pub struct CustomerResolverConfig {
    pub allow_guest_orders: bool,
    pub require_customer_email: bool,
    pub default_guest_customer_id: Option<i64>,
}

pub struct CustomerResolver {
    store: Arc<dyn RmsStore>,
    config: CustomerResolverConfig,
}

impl CustomerResolver {
    pub fn new(store: Arc<dyn RmsStore>, config: CustomerResolverConfig) -> Self {
        CustomerResolver { store, config }
    }

    pub async fn resolve(
        &self,
        customer: Option<&StorefrontCustomer>,
        billing_address: Option<&StorefrontAddress>,
    ) -> Result<Option<i64>, SyncError> {
        let Some(customer) = customer else {
            return self.guest_fallback("order has no customer block");
        };

        let Some(email) = customer.email.as_deref().filter(|e| !e.is_empty()) else {
            if self.config.require_customer_email {
                return Err(SyncError::CustomerResolution {
                    reference: customer.id.clone().unwrap_or_default(),
                    reason: "customer has no email and REQUIRE_CUSTOMER_EMAIL is set".to_string(),
                });
            }
            return self.guest_fallback("customer has no email");
        };

        if let Some(existing) = self.store.find_customer_by_email(email).await? {
            return Ok(Some(existing.id));
        }

        let id = self
            .store
            .create_customer(&NewCustomer {
                email: email.to_string(),
                first_name: customer.first_name.clone(),
                last_name: customer.last_name.clone(),
                phone: customer.phone.clone(),
                address1: billing_address.and_then(|a| a.address1.clone()),
                city: billing_address.and_then(|a| a.city.clone()),
            })
            .await?;
        Ok(Some(id))
    }

    fn guest_fallback(&self, reason: &str) -> Result<Option<i64>, SyncError> {
        if self.config.allow_guest_orders {
            Ok(self.config.default_guest_customer_id)
        } else {
            Err(SyncError::CustomerResolution {
                reference: String::new(),
                reason: format!("{reason} and ALLOW_ORDERS_WITHOUT_CUSTOMER is not set"),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryRmsStore;

    fn resolver(config: CustomerResolverConfig) -> CustomerResolver {
        CustomerResolver::new(Arc::new(InMemoryRmsStore::new()), config)
    }

    #[tokio::test]
    async fn guest_order_without_config_fails() {
        let r = resolver(CustomerResolverConfig {
            allow_guest_orders: false,
            require_customer_email: false,
            default_guest_customer_id: None,
        });
        let result = r.resolve(None, None).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn guest_order_with_fallback_returns_configured_id() {
        let r = resolver(CustomerResolverConfig {
            allow_guest_orders: true,
            require_customer_email: false,
            default_guest_customer_id: Some(7),
        });
        let result = r.resolve(None, None).await.unwrap();
        assert_eq!(result, Some(7));
    }

    #[tokio::test]
    async fn missing_email_requires_flag_enforced() {
        let r = resolver(CustomerResolverConfig {
            allow_guest_orders: true,
            require_customer_email: true,
            default_guest_customer_id: Some(7),
        });
        let customer = StorefrontCustomer {
            id: Some("c1".to_string()),
            email: None,
            first_name: None,
            last_name: None,
            phone: None,
        };
        let result = r.resolve(Some(&customer), None).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn known_email_reuses_existing_customer() {
        let store = Arc::new(InMemoryRmsStore::new());
        let id = store
            .create_customer(&NewCustomer {
                email: "a@example.com".to_string(),
                first_name: None,
                last_name: None,
                phone: None,
                address1: None,
                city: None,
            })
            .await
            .unwrap();
        let r = CustomerResolver::new(
            store,
            CustomerResolverConfig {
                allow_guest_orders: false,
                require_customer_email: false,
                default_guest_customer_id: None,
            },
        );
        let customer = StorefrontCustomer {
            id: Some("c1".to_string()),
            email: Some("a@example.com".to_string()),
            first_name: None,
            last_name: None,
            phone: None,
        };
        let result = r.resolve(Some(&customer), None).await.unwrap();
        assert_eq!(result, Some(id));
    }
}
