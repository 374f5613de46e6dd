const KIB: u64 = 1024;
const MIB: u64 = KIB * 1024;
const GIB: u64 = MIB * 1024;
const TIB: u64 = GIB * 1024;

/// Human-friendly byte count using binary units (KiB, MiB, ...).
pub fn format_bytes(num_bytes: u64) -> String {
    let value = num_bytes as f64;
    if num_bytes >= TIB {
        format!("{:.2}TiB", value / TIB as f64)
    } else if num_bytes >= GIB {
        format!("{:.2}GiB", value / GIB as f64)
    } else if num_bytes >= MIB {
        format!("{:.2}MiB", value / MIB as f64)
    } else if num_bytes >= KIB {
        format!("{:.2}KiB", value / KIB as f64)
    } else {
        format!("{num_bytes}B")
    }
}
