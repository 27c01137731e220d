//! Arcade physics: bodies, pairwise colliders and the per-frame step
//!
//! This is the narrow engine seam the scene is written against. Bodies are
//! addressed by [`BodyHandle`]; a handle whose body was removed resolves to
//! `None`, so entity code can guard every access.

use glam::Vec2;

/// Collision shape, centred on the body position
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Rect { width: f32, height: f32 },
    Circle { radius: f32 },
}

impl Shape {
    fn half_extents(&self) -> Vec2 {
        match *self {
            Shape::Rect { width, height } => Vec2::new(width / 2.0, height / 2.0),
            Shape::Circle { radius } => Vec2::new(radius, radius),
        }
    }
}

/// Which sides of a body touched something during the last step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Blocked {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

/// A simulated body
#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    pub shape: Shape,
    /// Centre of the shape
    pub position: Vec2,
    pub velocity: Vec2,
    pub allow_gravity: bool,
    /// Not moved by collisions
    pub immovable: bool,
    /// Restitution used on world bounds and contacts
    pub bounce: f32,
    /// Deceleration toward zero, px/s²
    pub drag: f32,
    /// Per-axis speed cap
    pub max_velocity: Option<f32>,
    pub collide_world_bounds: bool,
    pub blocked: Blocked,
}

impl Body {
    pub fn rect(center: Vec2, width: f32, height: f32) -> Self {
        Self::with_shape(center, Shape::Rect { width, height })
    }

    pub fn circle(center: Vec2, radius: f32) -> Self {
        Self::with_shape(center, Shape::Circle { radius })
    }

    /// Static rectangle: immovable, unaffected by gravity
    pub fn fixed_rect(center: Vec2, width: f32, height: f32) -> Self {
        Self::rect(center, width, height).without_gravity().immovable()
    }

    fn with_shape(center: Vec2, shape: Shape) -> Self {
        Self {
            shape,
            position: center,
            velocity: Vec2::ZERO,
            allow_gravity: true,
            immovable: false,
            bounce: 0.0,
            drag: 0.0,
            max_velocity: None,
            collide_world_bounds: false,
            blocked: Blocked::default(),
        }
    }

    pub fn with_bounce(mut self, bounce: f32) -> Self {
        self.bounce = bounce;
        self
    }

    pub fn with_drag(mut self, drag: f32) -> Self {
        self.drag = drag;
        self
    }

    pub fn with_max_velocity(mut self, max: f32) -> Self {
        self.max_velocity = Some(max);
        self
    }

    pub fn with_world_bounds(mut self) -> Self {
        self.collide_world_bounds = true;
        self
    }

    pub fn without_gravity(mut self) -> Self {
        self.allow_gravity = false;
        self
    }

    pub fn immovable(mut self) -> Self {
        self.immovable = true;
        self
    }

    fn clamp_velocity(&mut self) {
        if let Some(max) = self.max_velocity {
            self.velocity.x = self.velocity.x.clamp(-max, max);
            self.velocity.y = self.velocity.y.clamp(-max, max);
        }
    }
}

/// Opaque handle to a body in an [`ArcadeWorld`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BodyHandle(usize);

/// Penetration between two shapes; `normal` points from the first toward the second
#[derive(Debug, Clone, Copy, PartialEq)]
struct Contact {
    normal: Vec2,
    depth: f32,
}

/// Arcade world: gravity, world bounds and registered collider pairs
#[derive(Debug, Clone)]
pub struct ArcadeWorld {
    width: f32,
    height: f32,
    gravity_y: f32,
    bodies: Vec<Option<Body>>,
    colliders: Vec<(BodyHandle, BodyHandle)>,
}

impl ArcadeWorld {
    pub fn new(width: f32, height: f32, gravity_y: f32) -> Self {
        Self {
            width,
            height,
            gravity_y,
            bodies: Vec::new(),
            colliders: Vec::new(),
        }
    }

    pub fn add(&mut self, body: Body) -> BodyHandle {
        self.bodies.push(Some(body));
        BodyHandle(self.bodies.len() - 1)
    }

    /// Tear a body down. Later lookups through its handle return `None`.
    pub fn remove(&mut self, handle: BodyHandle) -> Option<Body> {
        self.bodies.get_mut(handle.0).and_then(Option::take)
    }

    pub fn body(&self, handle: BodyHandle) -> Option<&Body> {
        self.bodies.get(handle.0).and_then(Option::as_ref)
    }

    pub fn body_mut(&mut self, handle: BodyHandle) -> Option<&mut Body> {
        self.bodies.get_mut(handle.0).and_then(Option::as_mut)
    }

    /// Register a pair to be separated every step
    pub fn add_collider(&mut self, a: BodyHandle, b: BodyHandle) {
        self.colliders.push((a, b));
    }

    pub fn collider_count(&self) -> usize {
        self.colliders.len()
    }

    /// Advance the world by `dt` seconds
    pub fn step(&mut self, dt: f32) {
        let (width, height, gravity_y) = (self.width, self.height, self.gravity_y);

        for body in self.bodies.iter_mut().flatten() {
            body.blocked = Blocked::default();

            if body.allow_gravity {
                body.velocity.y += gravity_y * dt;
            }
            if body.drag > 0.0 {
                body.velocity.x = apply_drag(body.velocity.x, body.drag * dt);
                body.velocity.y = apply_drag(body.velocity.y, body.drag * dt);
            }
            body.clamp_velocity();

            body.position += body.velocity * dt;

            if body.collide_world_bounds {
                keep_in_bounds(body, width, height);
            }
        }

        for i in 0..self.colliders.len() {
            let (a, b) = self.colliders[i];
            self.separate(a, b);
        }
    }

    fn separate(&mut self, a: BodyHandle, b: BodyHandle) {
        if a == b {
            return;
        }
        let (Some(mut body_a), Some(mut body_b)) = (self.body(a).cloned(), self.body(b).cloned())
        else {
            return;
        };
        if body_a.immovable && body_b.immovable {
            return;
        }
        let Some(contact) = contact(&body_a, &body_b) else {
            return;
        };

        let inv_a = if body_a.immovable { 0.0 } else { 1.0 };
        let inv_b = if body_b.immovable { 0.0 } else { 1.0 };
        let total = inv_a + inv_b;
        let n = contact.normal;

        body_a.position -= n * (contact.depth * inv_a / total);
        body_b.position += n * (contact.depth * inv_b / total);

        // b lies below a: a rests on b
        if n.y > 0.5 {
            body_a.blocked.down = true;
            body_b.blocked.up = true;
        } else if n.y < -0.5 {
            body_a.blocked.up = true;
            body_b.blocked.down = true;
        } else if n.x > 0.0 {
            body_a.blocked.right = true;
            body_b.blocked.left = true;
        } else {
            body_a.blocked.left = true;
            body_b.blocked.right = true;
        }

        let approach = (body_b.velocity - body_a.velocity).dot(n);
        if approach < 0.0 {
            let restitution = body_a.bounce.max(body_b.bounce);
            let impulse = -(1.0 + restitution) * approach / total;
            body_a.velocity -= n * (impulse * inv_a);
            body_b.velocity += n * (impulse * inv_b);
            body_a.clamp_velocity();
            body_b.clamp_velocity();
        }

        let (width, height) = (self.width, self.height);
        for body in [&mut body_a, &mut body_b] {
            if body.collide_world_bounds {
                keep_in_bounds(body, width, height);
            }
        }

        if let Some(slot) = self.body_mut(a) {
            *slot = body_a;
        }
        if let Some(slot) = self.body_mut(b) {
            *slot = body_b;
        }
    }
}

fn apply_drag(v: f32, amount: f32) -> f32 {
    if v > 0.0 {
        (v - amount).max(0.0)
    } else {
        (v + amount).min(0.0)
    }
}

fn keep_in_bounds(body: &mut Body, width: f32, height: f32) {
    let half = body.shape.half_extents();

    if body.position.x - half.x < 0.0 {
        body.position.x = half.x;
        body.velocity.x = -body.velocity.x * body.bounce;
        body.blocked.left = true;
    } else if body.position.x + half.x > width {
        body.position.x = width - half.x;
        body.velocity.x = -body.velocity.x * body.bounce;
        body.blocked.right = true;
    }

    if body.position.y - half.y < 0.0 {
        body.position.y = half.y;
        body.velocity.y = -body.velocity.y * body.bounce;
        body.blocked.up = true;
    } else if body.position.y + half.y > height {
        body.position.y = height - half.y;
        body.velocity.y = -body.velocity.y * body.bounce;
        body.blocked.down = true;
    }
}

fn contact(a: &Body, b: &Body) -> Option<Contact> {
    match (a.shape, b.shape) {
        (Shape::Circle { radius }, Shape::Rect { .. }) => circle_rect(a.position, radius, b),
        (Shape::Rect { .. }, Shape::Circle { radius }) => {
            circle_rect(b.position, radius, a).map(|c| Contact {
                normal: -c.normal,
                depth: c.depth,
            })
        }
        (Shape::Circle { radius: ra }, Shape::Circle { radius: rb }) => {
            let d = b.position - a.position;
            let dist = d.length();
            let depth = ra + rb - dist;
            if depth <= 0.0 {
                return None;
            }
            let normal = if dist > f32::EPSILON {
                d / dist
            } else {
                Vec2::new(0.0, 1.0)
            };
            Some(Contact { normal, depth })
        }
        (Shape::Rect { .. }, Shape::Rect { .. }) => aabb(a, b),
    }
}

/// Overlap of the two bounding boxes along the shallower axis
fn aabb(a: &Body, b: &Body) -> Option<Contact> {
    let (ha, hb) = (a.shape.half_extents(), b.shape.half_extents());
    let d = b.position - a.position;
    let px = ha.x + hb.x - d.x.abs();
    let py = ha.y + hb.y - d.y.abs();
    if px <= 0.0 || py <= 0.0 {
        return None;
    }
    if px < py {
        Some(Contact {
            normal: Vec2::new(if d.x < 0.0 { -1.0 } else { 1.0 }, 0.0),
            depth: px,
        })
    } else {
        Some(Contact {
            normal: Vec2::new(0.0, if d.y < 0.0 { -1.0 } else { 1.0 }),
            depth: py,
        })
    }
}

fn circle_rect(center: Vec2, radius: f32, rect: &Body) -> Option<Contact> {
    let half = rect.shape.half_extents();
    let closest = Vec2::new(
        center.x.clamp(rect.position.x - half.x, rect.position.x + half.x),
        center.y.clamp(rect.position.y - half.y, rect.position.y + half.y),
    );
    let outward = center - closest;
    let dist = outward.length();

    if dist <= f32::EPSILON {
        // centre inside the rectangle: fall back to box overlap
        let as_box = Body::rect(center, radius * 2.0, radius * 2.0);
        return aabb(&as_box, rect);
    }
    if dist >= radius {
        return None;
    }
    Some(Contact {
        normal: -outward / dist,
        depth: radius - dist,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    fn world() -> ArcadeWorld {
        ArcadeWorld::new(1152.0, 768.0, 1000.0)
    }

    fn run(world: &mut ArcadeWorld, frames: usize) {
        for _ in 0..frames {
            world.step(DT);
        }
    }

    #[test]
    fn falling_body_rests_on_floor() {
        let mut world = world();
        let h = world.add(Body::rect(Vec2::new(100.0, 100.0), 20.0, 40.0).with_world_bounds());
        run(&mut world, 120);

        let body = world.body(h).unwrap();
        assert_eq!(body.position.y, 768.0 - 20.0);
        assert!(body.blocked.down);
        // settled: gravity re-adds one frame of speed which the floor cancels
        assert_eq!(body.velocity.y, 0.0);
    }

    #[test]
    fn body_without_gravity_stays_put() {
        let mut world = world();
        let h = world.add(Body::rect(Vec2::new(100.0, 100.0), 20.0, 40.0).without_gravity());
        run(&mut world, 30);
        assert_eq!(world.body(h).unwrap().position, Vec2::new(100.0, 100.0));
    }

    #[test]
    fn bouncy_ball_reflects_off_floor() {
        let mut world = ArcadeWorld::new(1152.0, 768.0, 0.0);
        let mut ball = Body::circle(Vec2::new(500.0, 750.0), 12.5)
            .with_bounce(0.8)
            .with_world_bounds();
        ball.velocity = Vec2::new(0.0, 600.0);
        let h = world.add(ball);
        world.step(DT);

        let ball = world.body(h).unwrap();
        assert!(ball.blocked.down);
        assert!((ball.velocity.y + 480.0).abs() < 1e-3);
    }

    #[test]
    fn max_velocity_caps_each_axis() {
        let mut world = ArcadeWorld::new(10_000.0, 10_000.0, 0.0);
        let mut ball = Body::circle(Vec2::new(5000.0, 5000.0), 10.0).with_max_velocity(800.0);
        ball.velocity = Vec2::new(2000.0, -1500.0);
        let h = world.add(ball);
        world.step(DT);
        assert_eq!(world.body(h).unwrap().velocity, Vec2::new(800.0, -800.0));
    }

    #[test]
    fn drag_slows_toward_zero_without_overshoot() {
        let mut world = ArcadeWorld::new(10_000.0, 10_000.0, 0.0);
        let mut ball = Body::circle(Vec2::new(5000.0, 5000.0), 10.0).with_drag(100.0);
        ball.velocity = Vec2::new(50.0, -1.0);
        let h = world.add(ball);
        world.step(DT);
        let v = world.body(h).unwrap().velocity;
        assert!(v.x > 0.0 && v.x < 50.0);
        assert_eq!(v.y, 0.0);
        run(&mut world, 60);
        assert_eq!(world.body(h).unwrap().velocity, Vec2::ZERO);
    }

    #[test]
    fn overlapping_boxes_are_pushed_apart_equally() {
        let mut world = ArcadeWorld::new(1152.0, 768.0, 0.0);
        let a = world.add(Body::rect(Vec2::new(100.0, 100.0), 20.0, 20.0));
        let b = world.add(Body::rect(Vec2::new(110.0, 100.0), 20.0, 20.0));
        world.add_collider(a, b);
        world.step(DT);

        let (pa, pb) = (world.body(a).unwrap().position, world.body(b).unwrap().position);
        assert!((pa.x - 95.0).abs() < 1e-4);
        assert!((pb.x - 115.0).abs() < 1e-4);
        assert!(world.body(a).unwrap().blocked.right);
        assert!(world.body(b).unwrap().blocked.left);
    }

    #[test]
    fn immovable_body_is_not_pushed() {
        let mut world = ArcadeWorld::new(1152.0, 768.0, 0.0);
        let wall = world.add(Body::fixed_rect(Vec2::new(100.0, 100.0), 20.0, 20.0));
        let mut mover = Body::rect(Vec2::new(115.0, 100.0), 20.0, 20.0);
        mover.velocity = Vec2::new(-100.0, 0.0);
        let mover = world.add(mover);
        world.add_collider(mover, wall);
        world.step(DT);

        assert_eq!(world.body(wall).unwrap().position, Vec2::new(100.0, 100.0));
        let m = world.body(mover).unwrap();
        assert!((m.position.x - 120.0).abs() < 1e-4);
        assert!(m.velocity.x >= 0.0);
    }

    #[test]
    fn ball_bounces_off_a_crossbar() {
        let mut world = ArcadeWorld::new(1152.0, 768.0, 0.0);
        let bar = world.add(Body::fixed_rect(Vec2::new(55.0, 496.0), 110.0, 16.0));
        let mut ball = Body::circle(Vec2::new(55.0, 478.0), 12.5).with_bounce(0.8);
        ball.velocity = Vec2::new(0.0, 300.0);
        let ball = world.add(ball);
        world.add_collider(ball, bar);
        world.step(DT);

        let b = world.body(ball).unwrap();
        assert!(b.velocity.y < 0.0, "ball should travel upward after hitting the bar");
        assert!(b.position.y + 12.5 <= 488.0 + 1e-3);
        assert!(b.blocked.down);
    }

    #[test]
    fn removed_body_is_gone_and_colliders_skip_it() {
        let mut world = world();
        let a = world.add(Body::rect(Vec2::new(100.0, 100.0), 20.0, 20.0));
        let b = world.add(Body::rect(Vec2::new(105.0, 100.0), 20.0, 20.0));
        world.add_collider(a, b);
        assert!(world.remove(b).is_some());
        assert!(world.body(b).is_none());
        assert!(world.remove(b).is_none());
        world.step(DT);
        assert!(world.body(a).is_some());
    }
}
