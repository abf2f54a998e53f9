use glam::Vec3;

/// Axis-aligned face directions used to cull and shade quads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Facing {
    Down,
    Up,
    North,
    South,
    West,
    East,
}

impl Facing {
    /// Candidates in tie-breaking order.
    pub const ALL: [Facing; 6] = [
        Facing::Down,
        Facing::Up,
        Facing::North,
        Facing::South,
        Facing::West,
        Facing::East,
    ];

    pub fn direction(&self) -> Vec3 {
        match self {
            Facing::Down => Vec3::NEG_Y,
            Facing::Up => Vec3::Y,
            Facing::North => Vec3::NEG_Z,
            Facing::South => Vec3::Z,
            Facing::West => Vec3::NEG_X,
            Facing::East => Vec3::X,
        }
    }

    pub fn opposite(&self) -> Facing {
        match self {
            Facing::Down => Facing::Up,
            Facing::Up => Facing::Down,
            Facing::North => Facing::South,
            Facing::South => Facing::North,
            Facing::West => Facing::East,
            Facing::East => Facing::West,
        }
    }

    /// The facing with the greatest positive dot product against `vector`.
    /// Zero, NaN or otherwise unmatched vectors give [`Facing::North`].
    pub fn from_vector(vector: Vec3) -> Facing {
        let mut best = Facing::North;
        let mut best_dot = 0.0;
        for facing in Facing::ALL {
            let dot = facing.direction().dot(vector);
            if dot > best_dot {
                best = facing;
                best_dot = dot;
            }
        }
        best
    }
}

#[cfg(test)]
mod test {
    use glam::Vec3;

    use super::Facing;

    #[test]
    fn test_from_vector() {
        for facing in Facing::ALL {
            assert_eq!(Facing::from_vector(facing.direction() * 3.0), facing);
            assert_eq!(facing.opposite().opposite(), facing);
        }
        assert_eq!(Facing::from_vector(Vec3::new(0.2, -0.9, 0.1)), Facing::Down);
        assert_eq!(Facing::from_vector(Vec3::new(-0.5, 0.1, 0.3)), Facing::West);
    }

    #[test]
    fn test_degenerate_vectors() {
        assert_eq!(Facing::from_vector(Vec3::ZERO), Facing::North);
        assert_eq!(Facing::from_vector(Vec3::NAN), Facing::North);
        // ties keep the earlier candidate
        assert_eq!(Facing::from_vector(Vec3::new(0.0, 1.0, 1.0)), Facing::Up);
        assert_eq!(Facing::from_vector(Vec3::new(1.0, 0.0, -1.0)), Facing::North);
    }
}
