use derive_more::Display;

pub type Result<T> = core::result::Result<T, LevelSetError>;

/// Errors surfaced by the extraction pipeline and by the settings setters.
#[derive(Debug, Display, Clone, PartialEq, Eq)]
pub enum LevelSetError {
    /// A grid needs at least two samples per axis to form a cell.
    #[display("resolution must be at least 2 samples per axis, got {_0}")]
    ResolutionTooSmall(u32),
    /// Dimension index outside `1..=3`.
    #[display("unknown dimension index {_0}, expected 1, 2 or 3")]
    UnknownDimension(u8),
    /// Scalar field index outside the built-in set.
    #[display("unknown scalar field index {_0}")]
    UnknownField(usize),
    /// A recomputation would allocate more vertex data than the configured
    /// budget allows. The previous buffers stay valid.
    #[display("extraction requested {requested} bytes of buffer space, budget is {budget}")]
    BufferBudgetExceeded { requested: usize, budget: usize },
}

impl std::error::Error for LevelSetError {}
