pub mod chart;
pub mod comparisons;
pub mod features;
pub mod opls;
pub mod output;
pub mod pipeline;
pub mod stats;
pub mod vip;
