//! Static declaration of the request options this adapter accepts.
//!
//! The host consults these once, when the coordinator is created, to decide
//! which request options it may pass on. None of them influence the
//! request/reply lifecycle.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FeatureType {
    NoFeature,
    Toll,
    Highway,
    PublicTransit,
    Ferry,
    Tunnel,
    DirtRoad,
    Parks,
    MotorPoolLane,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FeatureWeight {
    Neutral,
    Prefer,
    Require,
    Avoid,
    Disallow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ManeuverDetail {
    NoManeuvers,
    BasicManeuvers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RouteOptimization {
    Shortest,
    Fastest,
    MostEconomic,
    MostScenic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SegmentDetail {
    NoSegmentData,
    BasicSegmentData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TravelMode {
    Car,
    Pedestrian,
    Bicycle,
    PublicTransit,
    Truck,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub feature_types: &'static [FeatureType],
    pub feature_weights: &'static [FeatureWeight],
    pub maneuver_details: &'static [ManeuverDetail],
    pub route_optimizations: &'static [RouteOptimization],
    pub segment_details: &'static [SegmentDetail],
    pub travel_modes: &'static [TravelMode],
}

impl Capabilities {
    pub fn supports_travel_mode(&self, mode: TravelMode) -> bool {
        self.travel_modes.contains(&mode)
    }

    pub fn supports_optimization(&self, optimization: RouteOptimization) -> bool {
        self.route_optimizations.contains(&optimization)
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            feature_types: &[
                FeatureType::NoFeature,
                FeatureType::Toll,
                FeatureType::Highway,
                FeatureType::PublicTransit,
                FeatureType::Ferry,
                FeatureType::Tunnel,
                FeatureType::DirtRoad,
                FeatureType::Parks,
                FeatureType::MotorPoolLane,
            ],
            feature_weights: &[
                FeatureWeight::Neutral,
                FeatureWeight::Prefer,
                FeatureWeight::Require,
                FeatureWeight::Avoid,
                FeatureWeight::Disallow,
            ],
            maneuver_details: &[ManeuverDetail::NoManeuvers, ManeuverDetail::BasicManeuvers],
            route_optimizations: &[
                RouteOptimization::Shortest,
                RouteOptimization::Fastest,
                RouteOptimization::MostEconomic,
                RouteOptimization::MostScenic,
            ],
            segment_details: &[SegmentDetail::NoSegmentData, SegmentDetail::BasicSegmentData],
            travel_modes: &[
                TravelMode::Car,
                TravelMode::Pedestrian,
                TravelMode::Bicycle,
                TravelMode::PublicTransit,
                TravelMode::Truck,
            ],
        }
    }
}
