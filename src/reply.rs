/// Join the non-empty parts of a reply with newlines.
///
/// `None` means nothing should be posted.
pub fn emit<I, S>(parts: I) -> Option<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let parts: Vec<S> = parts
        .into_iter()
        .filter(|p| !p.as_ref().trim().is_empty())
        .collect();
    if parts.is_empty() {
        return None;
    }
    Some(
        parts
            .iter()
            .map(|p| p.as_ref())
            .collect::<Vec<&str>>()
            .join("\n"),
    )
}
