/// Domain errors of the E-CLP fixed-point arithmetic.
///
/// The two `Invalid*` variants are deliberately distinct so callers can
/// report "base parameters invalid" and "derived parameters invalid" as
/// separately actionable conditions.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("addition overflow")]
    AddOverflow,
    #[error("subtraction overflow")]
    SubOverflow,
    #[error("multiplication overflow")]
    MulOverflow,
    #[error("division by zero")]
    ZeroDivision,
    #[error("square root of a negative value")]
    NegativeSqrt,
    #[error("invalid base parameters: {0}")]
    InvalidParams(&'static str),
    #[error("invalid derived parameters: {0}")]
    InvalidDerivedParams(&'static str),
}
