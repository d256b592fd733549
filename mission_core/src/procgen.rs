//! Seeded map layout: a directed random walk of zone centers, accepted by
//! straightness ratio, with annular point zones placed around each center.

use std::any::Any;

use bevy_ecs::prelude::*;
use bevy_math::Vec2;
use mission_runtime::{
    LayoutParams, MapLayoutSpec, MissionRng, Point2, RngFactory, SamplingReport, Trigger,
    TriggerKind, ZoneSpec, ZoneTable,
};
use rand::Rng;

use crate::{
    context::ScenarioContext,
    error::ScenarioError,
    module::{Activation, ConditionModule},
};

pub const CHAIN_RNG_KEY: &str = "layout.chain";
pub const ZONE_RNG_KEY: &str = "layout.zones";

const OWNER: &str = "map_layout";

/// Layout produced for the running mission. Written once, on the first
/// `MapSetup`.
#[derive(Resource, Debug, Clone, PartialEq)]
pub struct GeneratedLayout(pub MapLayoutSpec);

#[derive(Debug, Clone, PartialEq)]
pub struct ChainSample {
    pub points: Vec<Vec2>,
    pub ratio: f32,
    pub best_ratio: f32,
    pub attempts: u32,
    pub accepted: bool,
}

/// Straight-line span of the chain relative to its walked length.
pub fn chain_ratio(points: &[Vec2], step_distance: f32) -> f32 {
    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return 0.0;
    };
    if points.len() < 2 || step_distance <= 0.0 {
        return 0.0;
    }
    first.distance(*last) / ((points.len() - 1) as f32 * step_distance)
}

fn window_distance(ratio: f32, window: [f32; 2]) -> f32 {
    let [min, max] = window;
    if ratio < min {
        min - ratio
    } else if ratio > max {
        ratio - max
    } else {
        0.0
    }
}

fn to_point(v: Vec2) -> Point2 {
    Point2::new(v.x, v.y)
}

fn invalid(parameter: &'static str, reason: impl Into<String>) -> ScenarioError {
    ScenarioError::InvalidParameter {
        owner: OWNER.to_string(),
        parameter,
        reason: reason.into(),
    }
}

fn validate_table(parameter: &'static str, table: &ZoneTable) -> Result<(), ScenarioError> {
    let [min_points, max_points] = table.point_count;
    if min_points > max_points {
        return Err(invalid(
            parameter,
            format!("point count range [{min_points}, {max_points}] is inverted"),
        ));
    }
    if !(table.inner_radius.is_finite() && table.outer_radius.is_finite())
        || table.inner_radius < 0.0
        || table.inner_radius > table.outer_radius
    {
        return Err(invalid(
            parameter,
            format!(
                "radius range [{}, {}] is inverted or negative",
                table.inner_radius, table.outer_radius
            ),
        ));
    }
    if !table.link_value.is_finite() {
        return Err(invalid(parameter, "link value must be finite"));
    }
    Ok(())
}

fn validate_params(params: &LayoutParams) -> Result<(), ScenarioError> {
    if params.chain_length < 2 {
        return Err(invalid(
            "chain_length",
            format!("needs at least 2 centers, got {}", params.chain_length),
        ));
    }
    if !(params.step_distance.is_finite() && params.step_distance > 0.0) {
        return Err(invalid(
            "step_distance",
            format!("must be positive, got {}", params.step_distance),
        ));
    }
    let [min, max] = params.ratio_window;
    if !(min.is_finite() && max.is_finite()) || min > max {
        return Err(invalid(
            "ratio_window",
            format!("window [{min}, {max}] is inverted"),
        ));
    }
    if params.max_attempts == 0 {
        return Err(invalid("max_attempts", "must allow at least one attempt"));
    }
    validate_table("terminal", &params.terminal)?;
    validate_table("interior", &params.interior)?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct LayoutGenerator {
    params: LayoutParams,
}

impl LayoutGenerator {
    pub fn new(params: LayoutParams) -> Result<Self, ScenarioError> {
        validate_params(&params)?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &LayoutParams {
        &self.params
    }

    pub fn generate(&self, seed: u64) -> MapLayoutSpec {
        let factory = RngFactory::new(seed);
        let mut chain_rng = factory.rng(CHAIN_RNG_KEY);
        let sample = self.sample_chain(&mut chain_rng);
        if sample.accepted {
            tracing::debug!(
                target: "mission::procgen",
                seed,
                attempts = sample.attempts,
                ratio = sample.ratio,
                "procgen.chain.accepted"
            );
        } else {
            tracing::warn!(
                target: "mission::procgen",
                seed,
                attempts = sample.attempts,
                ratio = sample.ratio,
                best_ratio = sample.best_ratio,
                "procgen.chain.window_missed"
            );
        }

        let mut zone_rng = factory.rng(ZONE_RNG_KEY);
        let last_index = sample.points.len().saturating_sub(1);
        let mut zones = Vec::new();
        for (index, center) in sample.points.iter().enumerate() {
            let terminal = index == 0 || index == last_index;
            let table = if terminal {
                &self.params.terminal
            } else {
                &self.params.interior
            };
            ring_zones(index, *center, terminal, table, &mut zone_rng, &mut zones);
        }
        zones.sort_by_key(|zone| zone.point_count);

        let centers: Vec<Point2> = sample.points.iter().copied().map(to_point).collect();
        let layout = MapLayoutSpec {
            seed,
            start: centers.first().copied().unwrap_or(Point2::ORIGIN),
            end: centers.last().copied().unwrap_or(Point2::ORIGIN),
            point_counts: zones.iter().map(|zone| zone.point_count).collect(),
            link_values: zones.iter().map(|zone| zone.link_value).collect(),
            centers,
            zones,
            sampling: SamplingReport {
                attempts: sample.attempts,
                ratio: sample.ratio,
                best_ratio: sample.best_ratio,
                accepted: sample.accepted,
            },
        };
        tracing::debug!(
            target: "mission::procgen",
            seed,
            zones = layout.zones.len(),
            points = layout.total_points(),
            "procgen.layout.generated"
        );
        layout
    }

    /// Walks chains until one lands inside the ratio window or the attempt
    /// budget runs out; the last chain is kept either way.
    pub fn sample_chain(&self, rng: &mut MissionRng) -> ChainSample {
        let window = self.params.ratio_window;
        let mut attempts = 0;
        let mut best_ratio = f32::NAN;
        loop {
            attempts += 1;
            let points = self.walk(rng);
            let ratio = chain_ratio(&points, self.params.step_distance);
            if best_ratio.is_nan()
                || window_distance(ratio, window) < window_distance(best_ratio, window)
            {
                best_ratio = ratio;
            }
            let accepted = (window[0]..=window[1]).contains(&ratio);
            if accepted || attempts >= self.params.max_attempts {
                return ChainSample {
                    points,
                    ratio,
                    best_ratio,
                    attempts,
                    accepted,
                };
            }
        }
    }

    fn walk(&self, rng: &mut MissionRng) -> Vec<Vec2> {
        let mut points = Vec::with_capacity(self.params.chain_length);
        let mut position = Vec2::ZERO;
        let mut heading: f32 = rng.gen_range(-1.0..=1.0);
        points.push(position);
        for _ in 1..self.params.chain_length {
            position += Vec2::from_angle(heading) * self.params.step_distance;
            points.push(position);
            heading += rng.gen_range(-1.0..=1.0);
        }
        points
    }
}

fn ring_zones(
    center_index: usize,
    center: Vec2,
    terminal: bool,
    table: &ZoneTable,
    rng: &mut MissionRng,
    out: &mut Vec<ZoneSpec>,
) {
    let [min_points, max_points] = table.point_count;
    for _ in 0..table.zones_per_center {
        let point_count = rng.gen_range(min_points..=max_points);
        let mut points = Vec::with_capacity(point_count as usize);
        for _ in 0..point_count {
            let offset = annulus_offset(table.inner_radius, table.outer_radius, rng);
            points.push(to_point(center + offset));
        }
        out.push(ZoneSpec {
            center_index,
            center: to_point(center),
            terminal,
            point_count,
            link_value: table.link_value,
            points,
        });
    }
}

/// Uniform by area between the two radii.
fn annulus_offset(inner: f32, outer: f32, rng: &mut MissionRng) -> Vec2 {
    let angle = rng.gen_range(0.0..std::f32::consts::TAU);
    let radius_sq = rng.gen_range(inner * inner..=outer * outer);
    Vec2::from_angle(angle) * radius_sq.sqrt()
}

/// Condition module generating the mission layout on `MapSetup`.
#[derive(Debug)]
pub struct MapLayout {
    generator: LayoutGenerator,
    activation: Activation,
}

impl MapLayout {
    pub const KIND: &'static str = "map_layout";

    pub fn new(params: LayoutParams) -> Result<Self, ScenarioError> {
        Ok(Self {
            generator: LayoutGenerator::new(params)?,
            activation: Activation::default(),
        })
    }

    pub fn generator(&self) -> &LayoutGenerator {
        &self.generator
    }

    pub fn layout<'a>(&self, ctx: &'a ScenarioContext) -> Option<&'a MapLayoutSpec> {
        ctx.world()
            .get_resource::<GeneratedLayout>()
            .map(|generated| &generated.0)
    }
}

impl ConditionModule for MapLayout {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn activate(&mut self, key: &str, ctx: &mut ScenarioContext) -> Result<(), ScenarioError> {
        self.activation.begin(key)?;
        let generator = self.generator.clone();
        let id = ctx.subscribe(TriggerKind::MapSetup, key, move |trigger, ctx| {
            let Trigger::MapSetup { seed } = trigger else {
                return Ok(());
            };
            if ctx.world().contains_resource::<GeneratedLayout>() {
                tracing::debug!(target: "mission::procgen", seed, "procgen.layout.exists");
                return Ok(());
            }
            let layout = generator.generate(*seed);
            tracing::info!(
                target: "mission::procgen",
                seed,
                centers = layout.centers.len(),
                zones = layout.zones.len(),
                accepted = layout.sampling.accepted,
                "procgen.layout.ready"
            );
            ctx.world_mut().insert_resource(GeneratedLayout(layout));
            Ok(())
        });
        self.activation.track(id);
        Ok(())
    }

    fn deactivate(&mut self, ctx: &mut ScenarioContext) {
        self.activation.end(ctx);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
