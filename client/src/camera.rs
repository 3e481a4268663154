use shared::{PlayerState, Viewport};

/// World-space camera that keeps the local player centred.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    world_width: f32,
    world_height: f32,
}

impl Camera {
    pub fn new(width: f32, height: f32, world_width: f32, world_height: f32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width,
            height,
            world_width,
            world_height,
        }
    }

    /// Centres on the player without showing anything outside the world.
    pub fn follow(&mut self, player: &PlayerState) {
        let (cx, cy) = player.center();
        self.x = (cx - self.width / 2.0).clamp(0.0, (self.world_width - self.width).max(0.0));
        self.y = (cy - self.height / 2.0).clamp(0.0, (self.world_height - self.height).max(0.0));
    }

    pub fn to_world(&self, screen_x: f32, screen_y: f32) -> (f32, f32) {
        (screen_x + self.x, screen_y + self.y)
    }

    pub fn to_screen(&self, world_x: f32, world_y: f32) -> (f32, f32) {
        (world_x - self.x, world_y - self.y)
    }

    pub fn is_visible(&self, x: f32, y: f32, width: f32, height: f32) -> bool {
        x < self.x + self.width
            && x + width > self.x
            && y < self.y + self.height
            && y + height > self.y
    }

    /// Rectangle reported to the server, rounded to whole pixels.
    pub fn viewport(&self) -> Viewport {
        Viewport {
            x: self.x.round(),
            y: self.y.round(),
            width: self.width.round(),
            height: self.height.round(),
        }
    }
}
