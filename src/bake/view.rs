/// Contexts in which the host draws a model, each with its own optional
/// display transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ViewTransformKind {
    #[default]
    None,
    ThirdPersonLeftHand,
    ThirdPersonRightHand,
    FirstPersonLeftHand,
    FirstPersonRightHand,
    Head,
    Gui,
    Ground,
    Fixed,
}

impl ViewTransformKind {
    pub const ALL: [ViewTransformKind; 9] = [
        ViewTransformKind::None,
        ViewTransformKind::ThirdPersonLeftHand,
        ViewTransformKind::ThirdPersonRightHand,
        ViewTransformKind::FirstPersonLeftHand,
        ViewTransformKind::FirstPersonRightHand,
        ViewTransformKind::Head,
        ViewTransformKind::Gui,
        ViewTransformKind::Ground,
        ViewTransformKind::Fixed,
    ];

    pub fn is_first_person(&self) -> bool {
        matches!(
            self,
            ViewTransformKind::FirstPersonLeftHand | ViewTransformKind::FirstPersonRightHand
        )
    }
}
