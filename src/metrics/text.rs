//! Metrics over post texts. Markup is stripped before counting.

use crate::catalog::CatalogBuilder;
use crate::community::Community;
use crate::datatypes::{CommunityDataLevel, MetricReturnType};
use crate::frame::Series;
use crate::metric::{Fields, MetricDef};
use crate::params::Params;
use crate::util::{count_words, tokenize};
use crate::value::Value;

pub(crate) fn register(b: CatalogBuilder) -> CatalogBuilder {
    use CommunityDataLevel::Posts;
    use MetricReturnType::DataFrame;
    b.metric(MetricDef::new("number_of_words", Posts, DataFrame, number_of_words))
        .metric(MetricDef::new("posts_word_occurrence", Posts, DataFrame, posts_word_occurrence))
}

fn number_of_words(c: &Community, _: &Params) -> anyhow::Result<Fields> {
    let counts: Series =
        c.post_rows().iter().map(|r| (r.id.clone(), r.text.as_deref().map(count_words).map_or(Value::Null, Value::from))).collect();
    Ok(Fields::new().with("number of words", counts))
}

/// Occurrences of each of `words` per post (exact token match), divided by the post's
/// length when `normalize` (default true). Posts without text get nulls.
fn posts_word_occurrence(c: &Community, params: &Params) -> anyhow::Result<Fields> {
    let words = params.str_list("words")?;
    let normalize = params.bool_or("normalize", true)?;
    let rows = c.post_rows();
    let mut columns: Vec<Series> = vec![Series::new(); words.len()];
    for r in rows.iter() {
        let Some(text) = r.text.as_deref() else {
            for col in &mut columns {
                col.push(r.id.clone(), Value::Null);
            }
            continue;
        };
        let tokens = tokenize(text);
        for (word, col) in words.iter().zip(columns.iter_mut()) {
            let n = tokens.iter().filter(|t| *t == word).count();
            let value = match (normalize, tokens.len()) {
                (false, _) => Value::from(n),
                (true, 0) => Value::float(0.0),
                (true, len) => Value::float(n as f64 / len as f64),
            };
            col.push(r.id.clone(), value);
        }
    }
    let mut fields = Fields::new();
    for (word, col) in words.iter().zip(columns) {
        fields.insert(format!("occurrence of {word}"), col);
    }
    Ok(fields)
}
