//! Flash-swap transaction construction.
//!
//! One atomic programmable transaction per leg:
//!
//! 1. `trade::flash_swap<X, Y>` borrows the output from the pool and
//!    returns `(Balance<X>, Balance<Y>, receipt)`
//! 2. the empty balance on the input side is destroyed
//! 3. a zero coin of the output type stands in for the unpaid side
//! 4. `trade::repay_flash_swap` settles the receipt with the caller's
//!    input coin and the placeholder, in `(X, Y)` order
//! 5. `slippage_check::assert_slippage` aborts if the pool price moved
//!    past the direction's sqrt-price limit
//! 6. the output balance becomes a coin and goes back to the signer

use tracing::debug;

use crate::config::PoolConfig;
use crate::sui::transaction::TransactionBlock;
use crate::sui::types::{Argument, ObjectId, ObjectRef, SuiAddress, TypeTag};
use crate::types::{MomentumError, SwapDirection, TradingPair};

/// Lowest sqrt price accepted when selling X for Y.
pub const SQRT_PRICE_LIMIT_X_TO_Y: u128 = 4_295_048_017;

/// Highest sqrt price accepted when selling Y for X.
pub const SQRT_PRICE_LIMIT_Y_TO_X: u128 = 79_226_673_515_401_279_992_447_579_050;

const FRAMEWORK: &str = "0x2";

/// Where the input coin comes from.
#[derive(Debug, Clone)]
pub enum InputCoin {
    /// Split from the gas coin (native asset).
    Gas,
    /// Merge these coins into the first, then split.
    Coins(Vec<ObjectRef>),
}

pub struct SwapTransactionBuilder {
    package: ObjectId,
    pool: ObjectId,
    pool_config: ObjectId,
    clock: ObjectId,
    slippage_package: ObjectId,
    framework: ObjectId,
    base_type: TypeTag,
    quote_type: TypeTag,
    pair: TradingPair,
}

impl SwapTransactionBuilder {
    pub fn from_config(pool: &PoolConfig) -> Result<Self, MomentumError> {
        Ok(Self {
            package: pool.package_id.parse()?,
            pool: pool.pool_id.parse()?,
            pool_config: pool.pool_config_id.parse()?,
            clock: pool.clock_id.parse()?,
            slippage_package: pool.slippage_check_package.parse()?,
            framework: FRAMEWORK.parse()?,
            base_type: pool.base.coin_type.parse()?,
            quote_type: pool.quote.coin_type.parse()?,
            pair: pool.pair(),
        })
    }

    pub fn pool_id(&self) -> ObjectId {
        self.pool
    }

    pub fn sqrt_price_limit(direction: SwapDirection) -> u128 {
        match direction {
            SwapDirection::BaseToQuote => SQRT_PRICE_LIMIT_X_TO_Y,
            SwapDirection::QuoteToBase => SQRT_PRICE_LIMIT_Y_TO_X,
        }
    }

    pub fn build(
        &self,
        direction: SwapDirection,
        amount_in: u64,
        input: InputCoin,
        recipient: SuiAddress,
    ) -> Result<TransactionBlock, MomentumError> {
        let mut tx = TransactionBlock::new();
        let amount = tx.pure(&amount_in)?;

        let input_coin = match input {
            InputCoin::Gas => tx.split_coins(Argument::GasCoin, vec![amount]),
            InputCoin::Coins(refs) => {
                let mut refs = refs.into_iter();
                let Some(first) = refs.next() else {
                    return Err(MomentumError::NoCoins(self.pair.input(direction).symbol.clone()));
                };
                let primary = tx.owned_object(first);
                let rest: Vec<Argument> = refs.map(|r| tx.owned_object(r)).collect();
                if !rest.is_empty() {
                    tx.merge_coins(primary, rest);
                }
                tx.split_coins(primary, vec![amount])
            }
        }
        .into_iter()
        .next()
        .ok_or_else(|| MomentumError::Build("split produced no coin".into()))?;

        let pool = tx.object(self.pool, true);
        let x_to_y = tx.pure(&direction.is_x_to_y())?;
        let by_amount_in = tx.pure(&true)?;
        let limit = tx.pure(&Self::sqrt_price_limit(direction))?;
        let clock = tx.object(self.clock, false);
        let pool_config = tx.object(self.pool_config, false);

        let pair_types = vec![self.base_type.clone(), self.quote_type.clone()];
        let flash = tx.move_call(
            self.package,
            "trade",
            "flash_swap",
            pair_types.clone(),
            vec![pool, x_to_y, by_amount_in, amount, limit, clock, pool_config],
        );
        let (base_balance, quote_balance, receipt) = (flash.nested(0), flash.nested(1), flash.nested(2));

        let (input_type, output_type, unused_balance, output_balance) = match direction {
            SwapDirection::BaseToQuote => (&self.base_type, &self.quote_type, base_balance, quote_balance),
            SwapDirection::QuoteToBase => (&self.quote_type, &self.base_type, quote_balance, base_balance),
        };

        tx.move_call(self.framework, "balance", "destroy_zero", vec![input_type.clone()], vec![unused_balance]);
        let zero_coin = tx.move_call(self.framework, "coin", "zero", vec![output_type.clone()], vec![]);
        tx.move_call(self.package, "trade", "swap_receipt_debts", vec![], vec![receipt]);

        let repay_input = tx.move_call(self.framework, "coin", "into_balance", vec![input_type.clone()], vec![input_coin]);
        let repay_zero = tx.move_call(self.framework, "coin", "into_balance", vec![output_type.clone()], vec![zero_coin]);
        let (repay_base, repay_quote) = match direction {
            SwapDirection::BaseToQuote => (repay_input, repay_zero),
            SwapDirection::QuoteToBase => (repay_zero, repay_input),
        };
        tx.move_call(
            self.package,
            "trade",
            "repay_flash_swap",
            pair_types.clone(),
            vec![pool, receipt, repay_base, repay_quote, pool_config],
        );

        tx.move_call(
            self.slippage_package,
            "slippage_check",
            "assert_slippage",
            pair_types,
            vec![pool, limit, x_to_y],
        );

        let output_coin = tx.move_call(self.framework, "coin", "from_balance", vec![output_type.clone()], vec![output_balance]);
        let recipient = tx.pure(&recipient)?;
        tx.transfer_objects(vec![output_coin], recipient);

        debug!(
            label = %self.pair.label(direction),
            amount_in,
            commands = tx.commands().len(),
            inputs = tx.inputs().len(),
            "Swap transaction built"
        );
        Ok(tx)
    }
}
