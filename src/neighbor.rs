use crate::genome::Genome;

/// One-step integer neighborhood of a genome.
///
/// Moves are enumerated gene by gene, trying `-1` before `+1`. Moves that
/// leave a gene's bounds are skipped. Once every move has been tried the
/// operator is finished, which means the origin is a local optimum.
pub struct NeighborOperator {
    origin: Genome,
    gene: usize,
    delta: i64,
}

impl NeighborOperator {
    pub fn new(origin: Genome) -> Self {
        Self {
            origin,
            gene: 0,
            delta: -1,
        }
    }

    /// Restart the enumeration around a new origin.
    pub fn reset(&mut self, origin: Genome) {
        *self = Self::new(origin);
    }

    pub fn origin(&self) -> &Genome {
        &self.origin
    }

    /// Return the neighbor at the first legal move from the cursor on.
    ///
    /// The cursor stays on the returned move until [`advance`](Self::advance) is called.
    pub fn generate_neighbor(&mut self) -> Option<Genome> {
        while self.gene < self.origin.len() {
            if let Some(neighbor) = self.origin.shifted(self.gene, self.delta) {
                return Some(neighbor);
            }
            self.advance();
        }
        None
    }

    /// Move the cursor past the current move.
    pub fn advance(&mut self) {
        self.delta = -self.delta;
        if self.delta == -1 {
            self.gene += 1;
        }
    }

    pub fn finished(&self) -> bool {
        let mut gene = self.gene;
        let mut delta = self.delta;
        while gene < self.origin.len() {
            if self.origin.shifted(gene, delta).is_some() {
                return false;
            }
            delta = -delta;
            if delta == -1 {
                gene += 1;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn lower_bound_gene_moves_up_first() {
        let genome = Genome::new(vec![0, 0], vec![(0, 10), (0, 10)]).unwrap();
        let mut op = NeighborOperator::new(genome);

        assert_eq!(op.generate_neighbor().unwrap().genes(), &[1, 0]);
        op.advance();
        assert_eq!(op.generate_neighbor().unwrap().genes(), &[0, 1]);
        op.advance();
        assert!(op.finished());
        assert!(op.generate_neighbor().is_none());
    }

    #[test]
    fn each_move_is_visited_once() {
        let genome = Genome::new(vec![3, 0, 5, 2], vec![(0, 5), (0, 4), (0, 5), (2, 2)]).unwrap();
        let mut op = NeighborOperator::new(genome.clone());

        let mut visited = HashSet::new();
        while let Some(neighbor) = op.generate_neighbor() {
            assert!(neighbor.check_bounds().is_ok());
            assert!(visited.insert((op.gene, op.delta)));
            op.advance();
        }

        // gene 0: both moves, gene 1: +1, gene 2: -1, gene 3: fixed
        assert_eq!(visited.len(), 4);
        assert!(visited.len() <= 2 * genome.len());
        assert!(op.finished());
    }

    #[test]
    fn finished_detects_exhausted_tail() {
        let genome = Genome::new(vec![1, 10], vec![(0, 10), (0, 10)]).unwrap();
        let mut op = NeighborOperator::new(genome);

        assert_eq!(op.generate_neighbor().unwrap().genes(), &[0, 10]);
        op.advance();
        assert_eq!(op.generate_neighbor().unwrap().genes(), &[2, 10]);
        op.advance();
        assert_eq!(op.generate_neighbor().unwrap().genes(), &[1, 9]);
        op.advance();

        // Only the illegal +1 move of the last gene remains.
        assert!(op.finished());
    }

    #[test]
    fn reset_restarts_enumeration() {
        let genome = Genome::new(vec![5], vec![(0, 10)]).unwrap();
        let mut op = NeighborOperator::new(genome);
        op.advance();
        op.advance();
        assert!(op.finished());

        let origin = Genome::new(vec![6], vec![(0, 10)]).unwrap();
        op.reset(origin);
        assert_eq!((op.gene, op.delta), (0, -1));
        assert_eq!(op.generate_neighbor().unwrap().genes(), &[5]);
    }
}
