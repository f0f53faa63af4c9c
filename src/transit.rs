//! Transit times, hold times, and geography for product flow

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Weekday};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Timing parameters for the flow simulation; all values in hours
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitConfig {
    pub farm_to_packer_base_hours: f64,
    pub packer_to_dc_base_hours: f64,
    pub dc_to_retail_base_hours: f64,
    pub processor_to_dc_base_hours: f64,
    pub hours_per_100_miles: f64,
    /// Post-harvest cooling before the lot can ship
    pub cooling_hold_hours: f64,
    pub packer_processing_hours: f64,
    pub dc_receiving_inspection_hours: f64,
    pub retail_stocking_delay_hours: f64,
    pub business_hours_start: u32,
    pub business_hours_end: u32,
    pub ship_on_weekends: bool,
    /// Fractional spread applied to each transit time
    pub transit_time_variance: f64,
    pub speed_factor: f64,
}

impl Default for TransitConfig {
    fn default() -> Self {
        Self {
            farm_to_packer_base_hours: 4.0,
            packer_to_dc_base_hours: 8.0,
            dc_to_retail_base_hours: 4.0,
            processor_to_dc_base_hours: 6.0,
            hours_per_100_miles: 2.5,
            cooling_hold_hours: 12.0,
            packer_processing_hours: 4.0,
            dc_receiving_inspection_hours: 6.0,
            retail_stocking_delay_hours: 4.0,
            business_hours_start: 6,
            business_hours_end: 18,
            ship_on_weekends: true,
            transit_time_variance: 0.2,
            speed_factor: 1.0,
        }
    }
}

/// Shipping legs with distinct base transit times
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Leg {
    FarmToPacker,
    PackerToDc,
    DcToRetail,
    ProcessorToDc,
}

impl TransitConfig {
    pub fn base_hours(&self, leg: Leg) -> f64 {
        match leg {
            Leg::FarmToPacker => self.farm_to_packer_base_hours,
            Leg::PackerToDc => self.packer_to_dc_base_hours,
            Leg::DcToRetail => self.dc_to_retail_base_hours,
            Leg::ProcessorToDc => self.processor_to_dc_base_hours,
        }
    }

    /// Distance-scaled transit time with random variance
    pub fn transit_time<R: Rng + ?Sized>(&self, leg: Leg, distance_miles: f64, rng: &mut R) -> Duration {
        let mut hours = self.base_hours(leg) + (distance_miles / 100.0) * self.hours_per_100_miles;
        hours *= self.speed_factor;
        if self.transit_time_variance > 0.0 {
            let v = self.transit_time_variance;
            hours *= rng.gen_range(1.0 - v..=1.0 + v);
        }
        hours_to_duration(hours)
    }

    /// A random minute within business hours on the given date
    pub fn random_business_hour<R: Rng + ?Sized>(&self, date: NaiveDate, rng: &mut R) -> NaiveDateTime {
        let last_hour = self.business_hours_end.saturating_sub(1).max(self.business_hours_start);
        let hour = rng.gen_range(self.business_hours_start..=last_hour);
        let minute = rng.gen_range(0..=59);
        date.and_time(NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN))
    }

    /// Move a timestamp forward to the next business hour
    pub fn advance_to_business_hour(&self, at: NaiveDateTime) -> NaiveDateTime {
        let opening = NaiveTime::from_hms_opt(self.business_hours_start, 0, 0).unwrap_or(NaiveTime::MIN);
        let is_weekend = |d: NaiveDate| matches!(d.weekday(), Weekday::Sat | Weekday::Sun);
        let next_weekday = |mut d: NaiveDate| {
            while is_weekend(d) {
                d += Duration::days(1);
            }
            d
        };

        let date = at.date();
        if is_weekend(date) && !self.ship_on_weekends {
            return next_weekday(date).and_time(opening);
        }
        if at.hour() < self.business_hours_start {
            return date.and_time(opening);
        }
        if at.hour() >= self.business_hours_end {
            let mut next = date + Duration::days(1);
            if !self.ship_on_weekends {
                next = next_weekday(next);
            }
            return next.and_time(opening);
        }
        at
    }
}

pub fn hours_to_duration(hours: f64) -> Duration {
    Duration::seconds((hours * 3600.0).round() as i64)
}

/// Default distance when either endpoint has no coordinates
pub const DEFAULT_DISTANCE_MILES: f64 = 100.0;

const EARTH_RADIUS_MILES: f64 = 3959.0;

/// Great-circle distance in miles
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2) + lat1_rad.cos() * lat2_rad.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_MILES * c
}

const CITY_COORDINATES: &[(&str, f64, f64)] = &[
    ("Salinas, CA", 36.6777, -121.6555),
    ("Yuma, AZ", 32.6927, -114.6277),
    ("Fresno, CA", 36.7378, -119.7871),
    ("Imperial Valley, CA", 32.8480, -115.5692),
    ("Oxnard, CA", 34.1975, -119.1771),
    ("Watsonville, CA", 36.9103, -121.7569),
    ("Coachella, CA", 33.6803, -116.1739),
    ("Gilroy, CA", 37.0058, -121.5683),
    ("Santa Maria, CA", 34.9530, -120.4357),
    ("Hollister, CA", 36.8525, -121.4016),
    ("Nogales, AZ", 31.3404, -110.9343),
    ("Willcox, AZ", 32.2528, -109.8320),
    ("Buckeye, AZ", 33.3703, -112.5838),
    ("Immokalee, FL", 26.4187, -81.4173),
    ("Homestead, FL", 25.4687, -80.4776),
    ("Tifton, GA", 31.4505, -83.5085),
    ("Moultrie, GA", 31.1799, -83.7890),
    ("Bakersfield, CA", 35.3733, -119.0187),
    ("Stockton, CA", 37.9577, -121.2908),
    ("Modesto, CA", 37.6391, -120.9969),
    ("Phoenix, AZ", 33.4484, -112.0740),
    ("Los Angeles, CA", 34.0522, -118.2437),
    ("Dallas, TX", 32.7767, -96.7970),
    ("Denver, CO", 39.7392, -104.9903),
    ("Chicago, IL", 41.8781, -87.6298),
    ("Atlanta, GA", 33.7490, -84.3880),
    ("Seattle, WA", 47.6062, -122.3321),
    ("Portland, OR", 45.5152, -122.6784),
    ("Salt Lake City, UT", 40.7608, -111.8910),
    ("Albuquerque, NM", 35.0844, -106.6504),
    ("San Francisco, CA", 37.7749, -122.4194),
    ("San Diego, CA", 32.7157, -117.1611),
    ("Las Vegas, NV", 36.1699, -115.1398),
    ("Houston, TX", 29.7604, -95.3698),
    ("Austin, TX", 30.2672, -97.7431),
    ("Tucson, AZ", 32.2226, -110.9747),
];

/// Coordinates for a "City, ST" key
pub fn city_coordinates(city: &str, state: &str) -> Option<(f64, f64)> {
    let key = format!("{city}, {state}");
    CITY_COORDINATES
        .iter()
        .find(|(name, _, _)| *name == key)
        .map(|&(_, lat, lon)| (lat, lon))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn haversine_phoenix_to_los_angeles() {
        let (lat1, lon1) = city_coordinates("Phoenix", "AZ").unwrap();
        let (lat2, lon2) = city_coordinates("Los Angeles", "CA").unwrap();
        let miles = haversine_distance(lat1, lon1, lat2, lon2);
        assert!((350.0..380.0).contains(&miles), "got {miles}");
    }

    #[test]
    fn unknown_city_has_no_coordinates() {
        assert!(city_coordinates("Atlantis", "XX").is_none());
    }

    #[test]
    fn transit_time_stays_within_variance() {
        let config = TransitConfig::default();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let t = config.transit_time(Leg::PackerToDc, 200.0, &mut rng);
            // base 8h + 5h distance, +-20%
            let hours = t.num_seconds() as f64 / 3600.0;
            assert!(hours >= 13.0 * 0.8 - 0.01 && hours <= 13.0 * 1.2 + 0.01, "got {hours}");
        }
    }

    #[test]
    fn business_hour_falls_inside_window() {
        let config = TransitConfig::default();
        let mut rng = StdRng::seed_from_u64(3);
        let day = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        for _ in 0..50 {
            let at = config.random_business_hour(day, &mut rng);
            assert_eq!(at.date(), day);
            assert!(at.hour() >= 6 && at.hour() < 18);
        }
    }

    #[test]
    fn after_hours_advances_to_next_opening() {
        let config = TransitConfig::default();
        let late = NaiveDate::from_ymd_opt(2024, 6, 3)
            .unwrap()
            .and_hms_opt(21, 0, 0)
            .unwrap();
        let next = config.advance_to_business_hour(late);
        assert_eq!(next, NaiveDate::from_ymd_opt(2024, 6, 4).unwrap().and_hms_opt(6, 0, 0).unwrap());
    }

    #[test]
    fn weekend_is_skipped_when_not_shipping() {
        let config = TransitConfig {
            ship_on_weekends: false,
            ..TransitConfig::default()
        };
        // 2024-06-08 is a Saturday
        let saturday = NaiveDate::from_ymd_opt(2024, 6, 8)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        let next = config.advance_to_business_hour(saturday);
        assert_eq!(next.date(), NaiveDate::from_ymd_opt(2024, 6, 10).unwrap());
    }
}
