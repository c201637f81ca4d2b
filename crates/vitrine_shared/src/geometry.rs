use glam::Vec3;

/// Barycentric tags for the three corners of a triangle.
pub const BARYCENTRIC_CORNERS: [[f32; 3]; 3] = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

/// Third-corner tag used when edge removal is on. The first component never
/// reaches zero along the edge between the second and third corners, so that
/// edge is never stroked.
const EDGE_REMOVED_THIRD_CORNER: [f32; 3] = [1.0, 0.0, 1.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EdgeRemoval {
    #[default]
    Off,
    OppositeFirstCorner,
}

/// Triangle mesh with an optional index buffer.
///
/// With `indices == None` every consecutive run of three positions is one
/// triangle and no vertex is shared.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub positions: Vec<Vec3>,
    pub indices: Option<Vec<u32>>,
    pub barycentric: Option<Vec<[f32; 3]>>,
}

impl Mesh {
    pub fn indexed(positions: Vec<Vec3>, indices: Vec<u32>) -> Self {
        Self {
            positions,
            indices: Some(indices),
            barycentric: None,
        }
    }

    pub fn is_indexed(&self) -> bool {
        self.indices.is_some()
    }

    pub fn triangle_count(&self) -> usize {
        match &self.indices {
            Some(indices) => indices.len() / 3,
            None => self.positions.len() / 3,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Expands the index buffer so each triangle owns three vertices.
    ///
    /// Does nothing on a mesh that is already unindexed. Any existing
    /// barycentric tags are dropped because they no longer line up.
    pub fn unindex(&mut self) {
        let Some(indices) = self.indices.take() else {
            return;
        };

        let usable = indices.len() - indices.len() % 3;
        let mut positions = Vec::with_capacity(usable);
        for &index in &indices[..usable] {
            positions.push(
                self.positions
                    .get(index as usize)
                    .copied()
                    .unwrap_or(Vec3::ZERO),
            );
        }

        self.positions = positions;
        self.barycentric = None;
    }

    /// Tags every vertex of an unindexed mesh with its corner's barycentric
    /// coordinate. Indexed meshes are unindexed first.
    ///
    /// Re-running overwrites the previous tags; the vertex count stays at
    /// `3 * triangle_count`.
    pub fn tag_barycentric(&mut self, edge_removal: EdgeRemoval) {
        self.unindex();

        let triangle_count = self.triangle_count();
        self.positions.truncate(triangle_count * 3);

        let third = match edge_removal {
            EdgeRemoval::Off => BARYCENTRIC_CORNERS[2],
            EdgeRemoval::OppositeFirstCorner => EDGE_REMOVED_THIRD_CORNER,
        };

        let mut tags = Vec::with_capacity(triangle_count * 3);
        for _ in 0..triangle_count {
            tags.push(BARYCENTRIC_CORNERS[0]);
            tags.push(BARYCENTRIC_CORNERS[1]);
            tags.push(third);
        }
        self.barycentric = Some(tags);
    }
}

/// Icosahedron projected onto a sphere of `radius`, each face split into
/// `(detail + 1)^2` triangles. Vertices are shared within a face only.
pub fn icosahedron(radius: f32, detail: u32) -> Mesh {
    let t = (1.0 + 5.0_f32.sqrt()) / 2.0;
    let corners = [
        Vec3::new(-1.0, t, 0.0),
        Vec3::new(1.0, t, 0.0),
        Vec3::new(-1.0, -t, 0.0),
        Vec3::new(1.0, -t, 0.0),
        Vec3::new(0.0, -1.0, t),
        Vec3::new(0.0, 1.0, t),
        Vec3::new(0.0, -1.0, -t),
        Vec3::new(0.0, 1.0, -t),
        Vec3::new(t, 0.0, -1.0),
        Vec3::new(t, 0.0, 1.0),
        Vec3::new(-t, 0.0, -1.0),
        Vec3::new(-t, 0.0, 1.0),
    ];
    let faces: [[usize; 3]; 20] = [
        [0, 11, 5],
        [0, 5, 1],
        [0, 1, 7],
        [0, 7, 10],
        [0, 10, 11],
        [1, 5, 9],
        [5, 11, 4],
        [11, 10, 2],
        [10, 7, 6],
        [7, 1, 8],
        [3, 9, 4],
        [3, 4, 2],
        [3, 2, 6],
        [3, 6, 8],
        [3, 8, 9],
        [4, 9, 5],
        [2, 4, 11],
        [6, 2, 10],
        [8, 6, 7],
        [9, 8, 1],
    ];

    let cols = detail as usize + 1;
    let mut positions = Vec::new();
    let mut indices = Vec::new();

    for face in faces {
        let a = corners[face[0]];
        let b = corners[face[1]];
        let c = corners[face[2]];

        // grid[i][j]: row i walks from edge ab towards c
        let mut grid: Vec<Vec<u32>> = Vec::with_capacity(cols + 1);
        for i in 0..=cols {
            let along = i as f32 / cols as f32;
            let aj = a.lerp(c, along);
            let bj = b.lerp(c, along);
            let rows = cols - i;

            let mut row = Vec::with_capacity(rows + 1);
            for j in 0..=rows {
                let point = if rows == 0 {
                    aj
                } else {
                    aj.lerp(bj, j as f32 / rows as f32)
                };
                row.push(positions.len() as u32);
                positions.push(point.normalize_or_zero() * radius);
            }
            grid.push(row);
        }

        for i in 0..cols {
            for j in 0..(2 * (cols - i) - 1) {
                let k = j / 2;
                if j % 2 == 0 {
                    indices.extend_from_slice(&[grid[i][k + 1], grid[i + 1][k], grid[i][k]]);
                } else {
                    indices.extend_from_slice(&[
                        grid[i][k + 1],
                        grid[i + 1][k + 1],
                        grid[i + 1][k],
                    ]);
                }
            }
        }
    }

    Mesh::indexed(positions, indices)
}

/// The shaded particle mesh: an unindexed, barycentric-tagged icosahedron.
pub fn particle_mesh(radius: f32, detail: u32, edge_removal: EdgeRemoval) -> Mesh {
    let mut mesh = icosahedron(radius, detail);
    mesh.unindex();
    mesh.tag_barycentric(edge_removal);
    mesh
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::{icosahedron, particle_mesh, EdgeRemoval, Mesh, BARYCENTRIC_CORNERS};

    fn quad() -> Mesh {
        Mesh::indexed(
            vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
            ],
            vec![0, 1, 2, 0, 2, 3],
        )
    }

    #[test]
    fn unindex_gives_each_triangle_its_own_vertices() {
        let mut mesh = quad();
        mesh.unindex();

        assert!(!mesh.is_indexed());
        assert_eq!(mesh.vertex_count(), 6);
        assert_eq!(mesh.positions[3], Vec3::new(0.0, 0.0, 0.0));
        assert_eq!(mesh.positions[5], Vec3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn barycentric_tags_cycle_per_triangle() {
        let mut mesh = quad();
        mesh.tag_barycentric(EdgeRemoval::Off);

        let tags = mesh.barycentric.as_ref().unwrap();
        assert_eq!(tags.len(), 6);
        for triangle in tags.chunks(3) {
            assert_eq!(triangle, &BARYCENTRIC_CORNERS[..]);
        }
    }

    #[test]
    fn edge_removal_marks_third_corner() {
        let mut mesh = quad();
        mesh.tag_barycentric(EdgeRemoval::OppositeFirstCorner);

        let tags = mesh.barycentric.as_ref().unwrap();
        assert_eq!(tags[2], [1.0, 0.0, 1.0]);
        assert_eq!(tags[5], [1.0, 0.0, 1.0]);
        assert_eq!(tags[0], [1.0, 0.0, 0.0]);
    }

    #[test]
    fn retagging_keeps_vertex_count() {
        let mut mesh = particle_mesh(0.07, 1, EdgeRemoval::Off);
        let triangles = mesh.triangle_count();
        assert_eq!(mesh.vertex_count(), 3 * triangles);

        mesh.unindex();
        mesh.tag_barycentric(EdgeRemoval::Off);
        assert_eq!(mesh.vertex_count(), 3 * triangles);
        assert_eq!(mesh.barycentric.as_ref().unwrap().len(), 3 * triangles);
    }

    #[test]
    fn icosahedron_detail_one_has_eighty_triangles_on_the_sphere() {
        let mesh = icosahedron(0.07, 1);
        assert_eq!(mesh.triangle_count(), 80);
        for position in &mesh.positions {
            assert!((position.length() - 0.07).abs() < 1e-5);
        }

        let soup = particle_mesh(0.07, 1, EdgeRemoval::Off);
        assert_eq!(soup.vertex_count(), 240);
    }

    #[test]
    fn icosahedron_faces_wind_outward() {
        let mut mesh = icosahedron(1.0, 0);
        mesh.unindex();
        for triangle in mesh.positions.chunks(3) {
            let normal = (triangle[1] - triangle[0]).cross(triangle[2] - triangle[0]);
            let centroid = (triangle[0] + triangle[1] + triangle[2]) / 3.0;
            assert!(normal.dot(centroid) > 0.0);
        }
    }
}
