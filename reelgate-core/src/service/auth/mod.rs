pub mod jwt;
pub mod password;
pub mod validator;

pub use jwt::{Claims, JwtService, TokenType};
pub use password::{check_password_policy, hash_password, verify_password, DUMMY_PASSWORD_HASH};
pub use validator::JwtValidator;
