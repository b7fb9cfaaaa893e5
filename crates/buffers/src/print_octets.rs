//! Hex rendering of byte runs for error messages.

/// Formats a byte slice as a hex string, showing at most `max` bytes.
///
/// # Example
///
/// ```
/// use sklearn_pickle_buffers::print_octets;
///
/// assert_eq!(print_octets(&[0x80, 0x04, 0x95, 0xff], 16), "80 04 95 ff");
/// assert_eq!(print_octets(&[0x01, 0x02, 0x03], 2), "01 02... (1 more)");
/// assert_eq!(print_octets(&[], 16), "");
/// ```
pub fn print_octets(octets: &[u8], max: usize) -> String {
    let mut result = octets
        .iter()
        .take(max)
        .map(|byte| format!("{byte:02x}"))
        .collect::<Vec<_>>()
        .join(" ");

    if octets.len() > max {
        result.push_str(&format!("... ({} more)", octets.len() - max));
    }

    result
}
