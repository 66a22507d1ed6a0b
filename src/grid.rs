use rand::Rng;

/// Board edge length. Every grid is `GRID_SIZE x GRID_SIZE`.
pub const GRID_SIZE: usize = 8;

/// Reserved tile kind: matches of this kind grant countdown time
/// instead of only score.
pub const TIME_BONUS_KIND: u8 = 7;

/// Board coordinate. `x` grows rightward, `y` grows downward; row 0 is
/// the top of the board (where refilled tiles spawn).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    pub x: usize,
    pub y: usize,
}

impl Position {
    pub fn new(x: usize, y: usize) -> Self {
        Position { x, y }
    }

    /// Orthogonal adjacency: Manhattan distance exactly 1.
    pub fn is_adjacent(self, other: Position) -> bool {
        let dx = self.x.abs_diff(other.x);
        let dy = self.y.abs_diff(other.y);
        dx + dy == 1
    }
}

/// One board cell. The id is unique within a grid's lifetime and
/// survives gravity shifts, but a removed tile's id never comes back;
/// the UI keys animations off it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tile {
    pub id: u64,
    pub kind: u8,
    pub matched: bool,
    pub falling: bool,
}

impl Tile {
    fn new(id: u64, kind: u8) -> Self {
        Tile {
            id,
            kind,
            matched: false,
            falling: false,
        }
    }
}

/// The board. Treated as a value type everywhere: transforms take a
/// reference and return a fresh grid, so the session's state history
/// stays explicit.
#[derive(Clone, Debug)]
pub struct Grid {
    kinds: u8,
    next_id: u64,
    cells: Vec<Tile>,
}

impl Grid {
    fn idx(pos: Position) -> usize {
        pos.y * GRID_SIZE + pos.x
    }

    /// Fill every cell with a uniformly random kind in `[0, kinds)`.
    /// May contain pre-existing matches; see [`Grid::settled_random`].
    pub fn random(kinds: u8, rng: &mut impl Rng) -> Self {
        let mut next_id = 0u64;
        let cells = (0..GRID_SIZE * GRID_SIZE)
            .map(|_| {
                let tile = Tile::new(next_id, rng.random_range(0..kinds));
                next_id += 1;
                tile
            })
            .collect();
        Grid {
            kinds,
            next_id,
            cells,
        }
    }

    /// Fill the board match-free: each cell's kind is rerolled while it
    /// would complete a 3-run with the two neighbors to its left or
    /// above. Needs `kinds >= 3` to terminate; below that it falls back
    /// to a plain random fill.
    pub fn settled_random(kinds: u8, rng: &mut impl Rng) -> Self {
        if kinds < 3 {
            return Grid::random(kinds, rng);
        }
        let mut grid = Grid {
            kinds,
            next_id: 0,
            cells: Vec::with_capacity(GRID_SIZE * GRID_SIZE),
        };
        for y in 0..GRID_SIZE {
            for x in 0..GRID_SIZE {
                let forbidden_left = if x >= 2 {
                    let a = grid.cells[y * GRID_SIZE + x - 1].kind;
                    let b = grid.cells[y * GRID_SIZE + x - 2].kind;
                    (a == b).then_some(a)
                } else {
                    None
                };
                let forbidden_up = if y >= 2 {
                    let a = grid.cells[(y - 1) * GRID_SIZE + x].kind;
                    let b = grid.cells[(y - 2) * GRID_SIZE + x].kind;
                    (a == b).then_some(a)
                } else {
                    None
                };
                let mut kind = rng.random_range(0..kinds);
                while Some(kind) == forbidden_left || Some(kind) == forbidden_up {
                    kind = rng.random_range(0..kinds);
                }
                let id = grid.next_id;
                grid.next_id += 1;
                grid.cells.push(Tile::new(id, kind));
            }
        }
        grid
    }

    /// Number of distinct tile kinds this board draws from.
    pub fn kinds(&self) -> u8 {
        self.kinds
    }

    pub fn tile(&self, pos: Position) -> Tile {
        self.cells[Self::idx(pos)]
    }

    pub fn kind_at(&self, pos: Position) -> u8 {
        self.cells[Self::idx(pos)].kind
    }

    /// All board positions, row-major.
    pub fn positions() -> impl Iterator<Item = Position> {
        (0..GRID_SIZE)
            .flat_map(|y| (0..GRID_SIZE).map(move |x| Position::new(x, y)))
    }

    /// Every position currently holding the given kind.
    pub fn positions_of_kind(&self, kind: u8) -> Vec<Position> {
        Self::positions()
            .filter(|&p| self.kind_at(p) == kind)
            .collect()
    }

    /// New grid with the tiles at `a` and `b` exchanged wholesale
    /// (kind and id travel together). Does not check legality.
    pub fn swapped(&self, a: Position, b: Position) -> Grid {
        let mut next = self.clone();
        next.cells.swap(Self::idx(a), Self::idx(b));
        next
    }

    /// New grid with the given positions flagged for removal.
    pub fn with_matched(
        &self,
        positions: impl IntoIterator<Item = Position>,
    ) -> Grid {
        let mut next = self.clone();
        for pos in positions {
            next.cells[Self::idx(pos)].matched = true;
        }
        next
    }

    /// New grid with all animation-state flags cleared.
    pub fn with_flags_cleared(&self) -> Grid {
        let mut next = self.clone();
        for tile in &mut next.cells {
            tile.matched = false;
            tile.falling = false;
        }
        next
    }

    pub(crate) fn set_tile(&mut self, pos: Position, tile: Tile) {
        self.cells[Self::idx(pos)] = tile;
    }

    pub(crate) fn set_kind(&mut self, pos: Position, kind: u8) {
        self.cells[Self::idx(pos)].kind = kind;
    }

    pub(crate) fn mint_tile(&mut self, kind: u8) -> Tile {
        let id = self.next_id;
        self.next_id += 1;
        Tile::new(id, kind)
    }
}
