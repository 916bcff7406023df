use serde::{Serialize, Deserialize};
use std::fmt::{self, Display};
use std::str::FromStr;
use crate::fit::FitError;

/// How the signal eigenvalues are tied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalTie {

    /// One variance per signal dimension per class (a_ij).
    Free,

    /// One variance per class, repeated over its signal dimensions (a_i).
    Class,

    /// One variance shared by every signal dimension of every class (a).
    Common
}

/// The three independent constraints that define a parsimonious HDDA model.
/// Every one of the twelve variants is a combination of those choices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ties {

    /// Signal subspace dimension shared by all classes (Q d) instead of estimated per class (Q_i d_i).
    pub common_dim : bool,

    pub signal : SignalTie,

    /// Noise variance shared by all classes (b) instead of estimated per class (b_i).
    pub common_noise : bool
}

/// Parsimonious covariance models of Bouveyron & Girard. Each class covariance is
/// parametrized by an orientation Q_i, a signal subspace dimension d_i, signal variances a
/// and a noise variance b; models differ by which of those are free or tied.
///
/// | Model | Covariance |
/// |-------|------------|
/// | M1  | a_ij b_i Q_i d_i |
/// | M2  | a_ij b_i Q_i d   |
/// | M3  | a_ij b Q_i d_i   |
/// | M4  | a_ij b Q_i d     |
/// | M5  | a_i b_i Q_i d_i  |
/// | M6  | a_i b_i Q_i d    |
/// | M7  | a_i b Q_i d_i    |
/// | M8  | a_i b Q_i d      |
/// | M9  | a b_i Q_i d_i    |
/// | M10 | a b_i Q_i d      |
/// | M11 | a b Q_i d_i      |
/// | M12 | a b Q_i d        |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Model {
    M1,
    M2,
    M3,
    M4,
    M5,
    M6,
    M7,
    M8,
    M9,
    M10,
    M11,
    M12
}

impl Model {

    pub const ALL : [Model; 12] = [
        Model::M1, Model::M2, Model::M3, Model::M4,
        Model::M5, Model::M6, Model::M7, Model::M8,
        Model::M9, Model::M10, Model::M11, Model::M12
    ];

    pub fn ties(&self) -> Ties {
        let ix = self.index();

        // Within each group of four models, the dimension alternates fastest, then the noise.
        let common_dim = ix % 2 == 1;
        let common_noise = (ix / 2) % 2 == 1;
        let signal = match ix / 4 {
            0 => SignalTie::Free,
            1 => SignalTie::Class,
            _ => SignalTie::Common
        };
        Ties { common_dim, signal, common_noise }
    }

    fn index(&self) -> usize {
        Self::ALL.iter().position(|m| m == self ).unwrap_or(0)
    }

}

impl Default for Model {

    fn default() -> Self {
        Model::M1
    }

}

impl Display for Model {

    fn fmt(&self, f : &mut fmt::Formatter) -> fmt::Result {
        write!(f, "M{}", self.index() + 1)
    }

}

impl FromStr for Model {

    type Err = FitError;

    fn from_str(s : &str) -> Result<Self, FitError> {
        let tag = s.trim();
        let num = tag.strip_prefix('M')
            .or_else(|| tag.strip_prefix('m') )
            .and_then(|n| n.parse::<usize>().ok() );
        match num {
            Some(n) if n >= 1 && n <= Self::ALL.len() => Ok(Self::ALL[n-1]),
            _ => Err(FitError::UnknownModel(s.to_string()))
        }
    }

}
