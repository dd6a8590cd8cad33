//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Renders the permission bits of a mode in `ls -l` style.
///
/// ## Examples
///
/// ```
/// use monolayer::utils::format_mode;
///
/// assert_eq!(format_mode(0o755), "rwxr-xr-x");
/// assert_eq!(format_mode(0o40311), "-wx--x--x");
/// assert_eq!(format_mode(0o000), "---------");
/// ```
pub fn format_mode(mode: u32) -> String {
    const FLAGS: [(u32, char); 9] = [
        (0o400, 'r'),
        (0o200, 'w'),
        (0o100, 'x'),
        (0o040, 'r'),
        (0o020, 'w'),
        (0o010, 'x'),
        (0o004, 'r'),
        (0o002, 'w'),
        (0o001, 'x'),
    ];

    FLAGS
        .iter()
        .map(|(bit, c)| if mode & bit != 0 { *c } else { '-' })
        .collect()
}
