/// `m:ss` for rest countdowns, `h:mm:ss` past the hour
pub fn format_clock(secs: u64) -> String {
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m}:{s:02}")
    }
}

/// `45s`, `12 min`, `1 h 05 min`
pub fn format_minutes(secs: u64) -> String {
    match secs {
        s if s < 60 => format!("{s}s"),
        s if s < 3600 => format!("{} min", (s + 30) / 60),
        s => {
            let mins = (s + 30) / 60;
            format!("{} h {:02} min", mins / 60, mins % 60)
        }
    }
}

pub fn format_load(load_kg: Option<f64>) -> String {
    match load_kg {
        Some(kg) if (kg - kg.round()).abs() < f64::EPSILON => format!("{kg:.0} kg"),
        Some(kg) => format!("{kg:.1} kg"),
        None => "bodyweight".to_string(),
    }
}

/// Total planned weight moved; bodyweight-only workouts have none
pub fn format_volume(kg: f64) -> String {
    if kg <= 0.0 {
        "-".to_string()
    } else {
        format!("{kg:.0} kg")
    }
}
