//! Canonical pair selection.
//
//  Pure: no IO. Clients hand in whatever the upstream returned.

use crate::types::TradingPair;

/// Order candidates by USD liquidity, deepest first.
///
/// Candidates without liquidity data are dropped. The sort is stable, so pairs
/// with equal liquidity keep the order the upstream listed them in.
pub fn rank_pairs<I>(candidates: I) -> Vec<TradingPair>
where
    I: IntoIterator<Item = (TradingPair, Option<f64>)>,
{
    let mut ranked: Vec<TradingPair> = candidates
        .into_iter()
        .filter_map(|(mut pair, liquidity)| {
            let liquidity = liquidity.filter(|l| l.is_finite())?;
            pair.liquidity_usd = liquidity;
            Some(pair)
        })
        .collect();

    ranked.sort_by(|a, b| b.liquidity_usd.total_cmp(&a.liquidity_usd));
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Pair;

    fn pair(address: &str) -> TradingPair {
        TradingPair {
            pair: Pair::new("TKN".into(), "USDC".into()),
            chain_id: "solana".into(),
            dex_id: "raydium".into(),
            pair_address: address.into(),
            price_usd: 1.0,
            liquidity_usd: 0.0,
            volume_h24: 0.0,
            volume_h1: 0.0,
            price_change_h1: 0.0,
            buys_h1: 0,
            sells_h1: 0,
            market_cap: None,
            fdv: None,
            created_at: None,
            url: String::new(),
            image_url: None,
        }
    }

    fn addresses(ranked: &[TradingPair]) -> Vec<&str> {
        ranked.iter().map(|p| p.pair_address.as_str()).collect()
    }

    #[test]
    fn sorts_by_liquidity_descending() {
        let ranked = rank_pairs(vec![
            (pair("a"), Some(10.0)),
            (pair("b"), Some(500.0)),
            (pair("c"), Some(50.0)),
        ]);

        assert_eq!(addresses(&ranked), vec!["b", "c", "a"]);
        assert_eq!(ranked[0].liquidity_usd, 500.0);
    }

    #[test]
    fn drops_pairs_without_liquidity() {
        let ranked = rank_pairs(vec![
            (pair("a"), None),
            (pair("b"), Some(1.0)),
            (pair("c"), Some(f64::NAN)),
        ]);

        assert_eq!(addresses(&ranked), vec!["b"]);
    }

    #[test]
    fn ties_keep_input_order() {
        let ranked = rank_pairs(vec![
            (pair("first"), Some(100.0)),
            (pair("low"), Some(1.0)),
            (pair("second"), Some(100.0)),
            (pair("third"), Some(100.0)),
        ]);

        assert_eq!(addresses(&ranked), vec!["first", "second", "third", "low"]);
    }

    #[test]
    fn empty_input_ranks_to_nothing() {
        assert!(rank_pairs(Vec::new()).is_empty());
    }
}
