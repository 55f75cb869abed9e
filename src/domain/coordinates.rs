#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Result<Coordinates, String> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(format!("{} is not a valid latitude.", latitude));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(format!("{} is not a valid longitude.", longitude));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }
}
