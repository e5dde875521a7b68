/// Capability every face-verifiable account satisfies. Employees, admins and
/// managers live in different tables with different shapes but identical
/// verification needs, so the verifier depends on this interface only.
pub trait FaceSubject {
    fn subject_id(&self) -> u64;
    fn display_name(&self) -> &str;
    /// URI of the durably stored, previously validated single-face image.
    /// `None` (or empty) means no face was ever registered.
    fn reference_image(&self) -> Option<&str>;
}
