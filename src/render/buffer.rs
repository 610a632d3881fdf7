use super::{RenderGeometry, RenderableCollector, ShaderHandle};

/// A collector that just keeps what it is given.
#[derive(Debug, Clone, Default)]
pub struct RenderBuffer {
    submissions: Vec<(ShaderHandle, RenderGeometry)>,
    full_materials: bool,
}

impl RenderBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A buffer standing in for a lit view.
    #[must_use]
    pub fn with_full_materials() -> Self {
        Self {
            submissions: Vec::new(),
            full_materials: true,
        }
    }

    #[must_use]
    pub fn submissions(&self) -> &[(ShaderHandle, RenderGeometry)] {
        &self.submissions
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.submissions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.submissions.is_empty()
    }

    /// Submissions drawn with the shader called `name`.
    pub fn with_shader<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a RenderGeometry> + 'a {
        self.submissions
            .iter()
            .filter(move |(shader, _)| shader.name() == name)
            .map(|(_, geometry)| geometry)
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.submissions
            .iter()
            .map(|(_, geometry)| geometry.vertices.len())
            .sum()
    }

    pub fn clear(&mut self) {
        self.submissions.clear();
    }
}

impl RenderableCollector for RenderBuffer {
    fn add_geometry(&mut self, shader: &ShaderHandle, geometry: RenderGeometry) {
        if geometry.is_empty() {
            return;
        }
        self.submissions.push((shader.clone(), geometry));
    }

    fn supports_full_materials(&self) -> bool {
        self.full_materials
    }
}
