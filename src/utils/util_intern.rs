use super::util::Result;

pub fn readable_size(bytes: usize) -> (f64, &'static str) {
    const UNITS: [(f64, &str); 5] = [
        (1.0, "B"),
        (1024.0, "KiB"),
        (1024.0 * 1024.0, "MiB"),
        (1024.0 * 1024.0 * 1024.0, "GiB"),
        (1024.0 * 1024.0 * 1024.0 * 1024.0, "TiB"),
    ];

    let value = bytes as f64;
    let mut unit = UNITS[0];
    for next in UNITS.iter().skip(1) {
        if value >= next.0 {
            unit = *next;
        } else {
            break;
        }
    }

    (value / unit.0, unit.1)
}

#[cfg(unix)]
fn max_resident_set() -> Result<usize> {
    let mut rusage: libc::rusage = unsafe { std::mem::zeroed() };
    let retval = unsafe { libc::getrusage(libc::RUSAGE_SELF, &mut rusage as *mut _) };
    match retval {
        0 => Ok(rusage.ru_maxrss as usize),
        _ => Err(crate::gvx_error!("libc::getrusage call failed")),
    }
}

/// Peak resident set size of this process in bytes.
#[cfg(target_os = "linux")]
pub fn peak_memory_usage() -> Result<usize> {
    // linux reports KiB
    Ok(max_resident_set()? * 1024)
}

#[cfg(target_os = "macos")]
pub fn peak_memory_usage() -> Result<usize> {
    max_resident_set()
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
pub fn peak_memory_usage() -> Result<usize> {
    Err(crate::gvx_error!(
        "No peak_memory_usage implementation for this OS"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_pick_largest_whole_unit() {
        assert_eq!(readable_size(512), (512.0, "B"));
        assert_eq!(readable_size(1536), (1.5, "KiB"));
        assert_eq!(readable_size(3 * 1024 * 1024), (3.0, "MiB"));
    }

    #[cfg(any(target_os = "linux", target_os = "macos"))]
    #[test]
    fn peak_memory_is_reported() {
        assert!(peak_memory_usage().unwrap() > 0);
    }
}
