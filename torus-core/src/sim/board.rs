use crate::constants::{
    ANGLE_PHASES, BOX_HEIGHT, LANDING_ANGLE_EVEN, LANDING_ANGLE_ODD, MAX_COLS, MELTED_ANGLE,
    MIN_POLE_HEIGHT, NUM_COLORS, SCORE_PER_TORUS, SPAWN_WAIT_TICKS,
};

use super::{Difficulty, Engine, Phase, PoleCell, Torus};

#[inline]
fn rotate(torus: Torus, by: i8) -> Torus {
    if torus.is_melted() {
        return torus;
    }
    Torus {
        color: torus.color,
        angle: (torus.angle + by).rem_euclid(ANGLE_PHASES),
    }
}

impl Difficulty {
    /// Box -> pole hand-off.
    pub fn to_pole(self, torus: Torus) -> Torus {
        match self {
            Self::Normal => torus,
            Self::Rotate => rotate(torus, 1),
            Self::Flip => rotate(torus, 3),
        }
    }

    /// Pole -> box hand-off.
    pub fn from_pole(self, torus: Torus) -> Torus {
        match self {
            Self::Normal | Self::Flip => torus,
            Self::Rotate => rotate(torus, 5),
        }
    }

    /// Applied to box pieces that slide down after the bottom one is removed.
    pub fn shift_down(self, torus: Torus) -> Torus {
        match self {
            Self::Rotate => rotate(torus, 1),
            Self::Normal | Self::Flip => torus,
        }
    }

    /// Applied to box pieces pushed up by an insertion at the bottom.
    pub fn shift_up(self, torus: Torus) -> Torus {
        match self {
            Self::Rotate => rotate(torus, 5),
            Self::Normal | Self::Flip => torus,
        }
    }
}

#[inline]
pub(crate) fn landing_angle(row: usize) -> i8 {
    if (3 + row) % 4 < 2 {
        LANDING_ANGLE_EVEN
    } else {
        LANDING_ANGLE_ODD
    }
}

impl Engine {
    /// Drops melted cells and compacts each column toward the bottom.
    pub(super) fn remove_melted(&mut self) {
        for col in 0..self.num_cols {
            let count = self.num_tori[col];
            let mut write = 0;
            for read in 0..count {
                let cell = self.grid[read][col];
                if matches!(cell, Some(torus) if !torus.is_melted()) {
                    self.grid[write][col] = cell;
                    write += 1;
                }
            }
            for row in write..count {
                self.grid[row][col] = None;
            }
            self.num_tori[col] = write;
        }
    }

    pub(super) fn advance_flying(&mut self) {
        for col in 0..self.num_cols {
            match self.flying_tori[col] {
                Some(color) => {
                    let height = self.flying_tori_height[col].saturating_sub(1);
                    let landing_row = self.num_tori[col];
                    if height > landing_row {
                        self.flying_tori_height[col] = height;
                        continue;
                    }

                    if landing_row < BOX_HEIGHT {
                        self.grid[landing_row][col] = Some(Torus {
                            color,
                            angle: landing_angle(landing_row),
                        });
                        self.num_tori[col] += 1;
                    }
                    self.flying_tori[col] = None;
                    self.flying_tori_height[col] = 0;
                    self.flying_tori_waiting[col] = 0;
                }
                None => {
                    self.flying_tori_waiting[col] += 1;
                    if self.flying_tori_waiting[col] >= SPAWN_WAIT_TICKS {
                        self.flying_tori[col] = Some(self.rng.next_color(NUM_COLORS));
                        self.flying_tori_height[col] = BOX_HEIGHT;
                        self.flying_tori_waiting[col] = 0;
                    }
                }
            }
        }
    }

    /// Marks every single-colored full row as melted and scores it. Returns
    /// the number of rows melted.
    pub(super) fn melt_full_rows(&mut self) -> usize {
        let mut melted = 0;
        for row in 0..BOX_HEIGHT {
            if !self.row_melts(row) {
                continue;
            }
            for cell in self.grid[row].iter_mut().flatten() {
                cell.angle = MELTED_ANGLE;
            }
            self.score += SCORE_PER_TORUS * self.num_cols as u64;
            melted += 1;
        }
        melted
    }

    fn row_melts(&self, row: usize) -> bool {
        let mut color = None;
        for cell in &self.grid[row] {
            match cell {
                Some(torus) if !torus.is_melted() => match color {
                    None => color = Some(torus.color),
                    Some(first) if first == torus.color => {}
                    Some(_) => return false,
                },
                _ => return false,
            }
        }
        color.is_some()
    }

    pub(super) fn shift_pole(&mut self, delta: isize) -> bool {
        let Some(target) = self.pole_pos.checked_add_signed(delta) else {
            return false;
        };
        if target >= self.num_cols {
            return false;
        }

        let from = self.pole_pos;
        for row in self.pole.iter_mut() {
            row[target] = row[from];
            row[from] = PoleCell::Empty;
        }
        self.pole_pos = target;
        true
    }

    /// `up`: the held piece nearest the box enters the bottom of the box
    /// column and lifts the stack by one.
    pub(super) fn extract_up(&mut self) -> bool {
        let col = self.pole_pos;
        let held = self.num_tori_in_pole;
        if self.num_tori[col] >= BOX_HEIGHT || held == 0 {
            return false;
        }
        let PoleCell::Piece(torus) = self.pole[0][col] else {
            return false;
        };

        for row in 0..held - 1 {
            self.pole[row][col] = self.pole[row + 1][col];
        }
        self.pole[held - 1][col] = PoleCell::Marker;
        self.num_tori_in_pole -= 1;

        let difficulty = self.difficulty;
        for row in (0..self.num_tori[col]).rev() {
            self.grid[row + 1][col] = self.grid[row][col].map(|t| difficulty.shift_up(t));
        }
        self.grid[0][col] = Some(difficulty.from_pole(torus));
        self.num_tori[col] += 1;

        self.melt_full_rows();
        true
    }

    /// `down`: the bottom box piece is pulled onto the pole and the column
    /// slides down to fill the gap.
    pub(super) fn insert_down(&mut self) -> bool {
        let col = self.pole_pos;
        let count = self.num_tori[col];
        if count == 0 || self.num_tori_in_pole >= self.pole.len() {
            return false;
        }
        let Some(torus) = self.grid[0][col] else {
            return false;
        };
        if torus.is_melted() {
            return false;
        }

        let difficulty = self.difficulty;
        for row in 1..count {
            self.grid[row - 1][col] = self.grid[row][col].map(|t| difficulty.shift_down(t));
        }
        self.grid[count - 1][col] = None;
        self.num_tori[col] -= 1;

        for row in (0..self.num_tori_in_pole).rev() {
            self.pole[row + 1][col] = self.pole[row][col];
        }
        self.pole[0][col] = PoleCell::Piece(difficulty.to_pole(torus));
        self.num_tori_in_pole += 1;

        self.melt_full_rows();
        true
    }

    pub(super) fn level_up(&mut self) {
        self.level += 1;

        if self.pole.len() > MIN_POLE_HEIGHT {
            if self.num_tori_in_pole >= self.pole.len() {
                if self.num_tori[self.pole_pos] >= BOX_HEIGHT {
                    self.phase = Phase::GameOver;
                    return;
                }
                self.extract_up();
            }
            self.pole.pop();
            return;
        }

        if self.num_cols < MAX_COLS {
            self.widen();
        }
        while self.pole.len() < self.num_cols {
            let mut row = vec![PoleCell::Empty; self.num_cols];
            row[self.pole_pos] = PoleCell::Marker;
            self.pole.push(row);
        }
    }

    fn widen(&mut self) {
        for row in self.grid.iter_mut() {
            row.push(None);
        }
        for row in self.pole.iter_mut() {
            row.push(PoleCell::Empty);
        }
        self.num_tori.push(0);
        self.flying_tori.push(None);
        self.flying_tori_height.push(0);
        self.flying_tori_waiting.push(0);
        self.num_cols += 1;
    }
}
