pub mod auth_service;
pub mod category_defaults;
pub mod category_resolver;
pub mod category_service;
pub mod currency_service;
pub mod normalizer;
pub mod notifier;
pub mod quota;
pub mod summary;
pub mod token_service;
pub mod transaction_service;

pub use auth_service::{AuthError, AuthService, AuthServiceImpl};
pub use category_defaults::DefaultCategoryBootstrapper;
pub use category_resolver::{CategoryLookup, CategoryResolver};
pub use category_service::{CategoryError, CategoryService, CategoryServiceImpl};
pub use currency_service::{CurrencyError, CurrencyService, CurrencyServiceImpl};
pub use notifier::{LogNotifier, NotificationKind, Notifier};
pub use quota::{QuotaEnforcer, UserLocks};
pub use token_service::{JwtTokenService, TokenError, TokenKind, TokenService};
pub use transaction_service::{TransactionError, TransactionService, TransactionServiceImpl};
