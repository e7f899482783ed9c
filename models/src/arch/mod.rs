mod digits;
mod language;
mod perceptron;
mod regression;

pub use digits::DigitClassificationModel;
pub use language::{LANGUAGES, LanguageIDModel};
pub use perceptron::{PerceptronConfig, PerceptronModel, PerceptronReport};
pub use regression::RegressionModel;
