//! # Platform Integration Flows
//!
//! End-to-end business scenarios spanning several facets through one
//! dispatcher, plus the async service surface.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tessera_core::dispatch::Dispatcher;
    use tessera_core::events::DiamondEvent;
    use tessera_core::service::{create_test_service, DiamondApi};
    use tessera_core::storage::{AppStorage, ProposalAction};
    use tessera_types::codec::{decode_return, encode_call};
    use tessera_types::values::{Address, Bytes, Selector, U256};

    use tessera_assets::AssetsFacet;
    use tessera_compliance::ComplianceFacet;
    use tessera_dao::DaoFacet;
    use tessera_exchange::ExchangeFacet;
    use tessera_market::MarketFacet;
    use tessera_profit::ProfitFacet;
    use tessera_staking::StakingFacet;

    const DEPLOYER: Address = Address([0xde; 20]);
    const ALICE: Address = Address([0xa1; 20]);
    const BOB: Address = Address([0xb0; 20]);

    const ASSETS: Address = Address([0x0a; 20]);
    const MARKET: Address = Address([0x0b; 20]);
    const PROFIT: Address = Address([0x0c; 20]);
    const STAKING: Address = Address([0x0d; 20]);
    const DAO: Address = Address([0x0e; 20]);
    const EXCHANGE: Address = Address([0x0f; 20]);
    const COMPLIANCE: Address = Address([0x10; 20]);

    /// A dispatcher with every platform facet installed.
    fn platform() -> Dispatcher {
        let mut d = Dispatcher::new(Address::new([0xd1; 20]), DEPLOYER);
        d.register_code(ASSETS, Arc::new(AssetsFacet::new(ASSETS)));
        d.register_code(MARKET, Arc::new(MarketFacet::new(MARKET)));
        d.register_code(PROFIT, Arc::new(ProfitFacet::new(PROFIT)));
        d.register_code(STAKING, Arc::new(StakingFacet::new(STAKING)));
        d.register_code(DAO, Arc::new(DaoFacet::new(DAO)));
        d.register_code(EXCHANGE, Arc::new(ExchangeFacet::new(EXCHANGE)));
        d.register_code(COMPLIANCE, Arc::new(ComplianceFacet::new(COMPLIANCE)));
        for module in [ASSETS, MARKET, PROFIT, STAKING, DAO, EXCHANGE, COMPLIANCE] {
            d.install_module(DEPLOYER, module).unwrap();
        }
        d
    }

    fn create_asset(d: &mut Dispatcher, supply: u64, price: u64) -> u64 {
        let input = encode_call(&tessera_assets::CreateAssetArgs {
            name: "Bridge Tower".into(),
            supply: U256::from(supply),
            price: U256::from(price),
        });
        let output = d
            .call(
                DEPLOYER,
                U256::zero(),
                Selector::of(tessera_assets::sig::CREATE_ASSET),
                &input,
            )
            .unwrap();
        decode_return(&output).unwrap()
    }

    fn holding(d: &Dispatcher, asset_id: u64, holder: Address) -> U256 {
        d.storage().holding(asset_id, holder)
    }

    // =============================================================================
    // MARKETPLACE: CREATE -> LIST -> BUY -> PROFIT -> CLAIM
    // =============================================================================

    #[test]
    fn test_create_list_buy_distribute_claim() {
        let mut d = platform();
        let asset_id = create_asset(&mut d, 1000, 2);

        // Deployer lists 400 units at 3 native each.
        let input = encode_call(&tessera_market::ListAssetArgs {
            asset_id,
            amount: U256::from(400),
            price_per_unit: U256::from(3),
        });
        let output = d
            .call(
                DEPLOYER,
                U256::zero(),
                Selector::of(tessera_market::sig::LIST_ASSET),
                &input,
            )
            .unwrap();
        let listing_id: u64 = decode_return(&output).unwrap();
        // Escrowed out of the seller's holdings.
        assert_eq!(holding(&d, asset_id, DEPLOYER), U256::from(600));

        // Alice buys the listing for 1200 native.
        let input = encode_call(&tessera_market::ListingArgs { listing_id });
        d.call(
            ALICE,
            U256::from(1200),
            Selector::of(tessera_market::sig::BUY_LISTING),
            &input,
        )
        .unwrap();
        assert_eq!(holding(&d, asset_id, ALICE), U256::from(400));
        assert_eq!(d.storage().credits[&DEPLOYER], U256::from(1200));

        // A 100-native profit distribution splits 60/40.
        let input = encode_call(&tessera_profit::AssetIdArgs { asset_id });
        d.call(
            DEPLOYER,
            U256::from(100),
            Selector::of(tessera_profit::sig::DISTRIBUTE),
            &input,
        )
        .unwrap();

        let output = d
            .call(
                ALICE,
                U256::zero(),
                Selector::of(tessera_profit::sig::CLAIM),
                &input,
            )
            .unwrap();
        let claimed: U256 = decode_return(&output).unwrap();
        assert_eq!(claimed, U256::from(40));
        assert_eq!(d.storage().credits[&ALICE], U256::from(40));

        // The audit trail carries each business event.
        let topics: Vec<&str> = d
            .storage()
            .events
            .iter()
            .filter_map(|e| match e {
                DiamondEvent::Module { topic, .. } => Some(topic.as_str()),
                _ => None,
            })
            .collect();
        for expected in [
            "AssetCreated",
            "AssetListed",
            "ListingSold",
            "ProfitDistributed",
            "ProfitClaimed",
        ] {
            assert!(topics.contains(&expected), "missing event {expected}");
        }
    }

    // =============================================================================
    // GOVERNANCE: STAKE -> PROPOSE -> VOTE -> EXECUTE AN ADMIN ACTION
    // =============================================================================

    #[test]
    fn test_governance_denies_account_through_compliance() {
        let mut d = platform();
        let asset_id = create_asset(&mut d, 1000, 2);
        d.storage_mut()
            .credit_token(AppStorage::UTILITY_TOKEN, ALICE, U256::from(500));

        // Alice stakes to gain proposal and voting power.
        let input = encode_call(&tessera_staking::AmountArgs {
            amount: U256::from(500),
        });
        d.call(
            ALICE,
            U256::zero(),
            Selector::of(tessera_staking::sig::STAKE),
            &input,
        )
        .unwrap();

        // Proposal: deny bob. setDenied is admin-gated; it passes only
        // because execution forwards with the dispatcher as caller.
        let action = ProposalAction {
            selector: Selector::of(tessera_compliance::sig::SET_DENIED),
            input: Bytes::from_vec(encode_call(&tessera_compliance::SetListedArgs {
                account: BOB,
                listed: true,
            })),
        };
        let input = encode_call(&tessera_dao::ProposeArgs {
            description: "deny bob pending KYC review".into(),
            action: Some(action),
        });
        let output = d
            .call(ALICE, U256::zero(), Selector::of(tessera_dao::sig::PROPOSE), &input)
            .unwrap();
        let proposal_id: u64 = decode_return(&output).unwrap();

        let input = encode_call(&tessera_dao::CastVoteArgs {
            proposal_id,
            support: true,
        });
        d.call(ALICE, U256::zero(), Selector::of(tessera_dao::sig::CAST_VOTE), &input)
            .unwrap();

        let input = encode_call(&tessera_dao::ProposalIdArgs { proposal_id });
        d.call(
            ALICE,
            U256::zero(),
            Selector::of(tessera_dao::sig::EXECUTE_PROPOSAL),
            &input,
        )
        .unwrap();
        assert!(d.storage().denied.contains(&BOB));

        // The executed policy bites in the assets facet.
        let input = encode_call(&tessera_assets::TransferAssetArgs {
            asset_id,
            to: BOB,
            amount: U256::from(1),
        });
        let err = d
            .call(
                DEPLOYER,
                U256::zero(),
                Selector::of(tessera_assets::sig::TRANSFER_ASSET),
                &input,
            )
            .unwrap_err();
        assert!(err.to_string().contains("unauthorized"));
        assert_eq!(holding(&d, asset_id, DEPLOYER), U256::from(1000));
    }

    // =============================================================================
    // COMPLIANCE ACROSS THE MARKETPLACE
    // =============================================================================

    #[test]
    fn test_denied_buyer_cannot_buy_listing() {
        let mut d = platform();
        let asset_id = create_asset(&mut d, 100, 1);

        let input = encode_call(&tessera_market::ListAssetArgs {
            asset_id,
            amount: U256::from(50),
            price_per_unit: U256::from(1),
        });
        let output = d
            .call(
                DEPLOYER,
                U256::zero(),
                Selector::of(tessera_market::sig::LIST_ASSET),
                &input,
            )
            .unwrap();
        let listing_id: u64 = decode_return(&output).unwrap();

        let input = encode_call(&tessera_compliance::SetListedArgs {
            account: BOB,
            listed: true,
        });
        d.call(
            DEPLOYER,
            U256::zero(),
            Selector::of(tessera_compliance::sig::SET_DENIED),
            &input,
        )
        .unwrap();

        let input = encode_call(&tessera_market::ListingArgs { listing_id });
        let err = d
            .call(
                BOB,
                U256::from(50),
                Selector::of(tessera_market::sig::BUY_LISTING),
                &input,
            )
            .unwrap_err();
        assert!(err.to_string().contains("unauthorized"));
        // Escrow untouched, listing intact, value rolled back.
        assert!(d.storage().listings.contains_key(&listing_id));
        assert_eq!(d.storage().native_balance, U256::zero());
    }

    // =============================================================================
    // STAKING REWARDS FEED THE EXCHANGE
    // =============================================================================

    #[test]
    fn test_staking_rewards_swap_on_the_exchange() {
        let mut d = platform();
        let gold = Address::new([0x60; 20]);
        d.storage_mut()
            .credit_token(AppStorage::UTILITY_TOKEN, ALICE, U256::from(100));

        // Price both tokens and fund the gold reserve.
        for (token, price) in [(AppStorage::UTILITY_TOKEN, 5u64), (gold, 50)] {
            let input = encode_call(&tessera_exchange::SetPriceArgs {
                token,
                price: U256::from(price),
            });
            d.call(
                DEPLOYER,
                U256::zero(),
                Selector::of(tessera_exchange::sig::SET_PRICE),
                &input,
            )
            .unwrap();
        }
        let this = d.address();
        d.storage_mut().credit_token(gold, this, U256::from(100));

        // Stake, let two epochs pass, claim 200 utility in rewards.
        let input = encode_call(&tessera_staking::AmountArgs {
            amount: U256::from(100),
        });
        d.call(
            ALICE,
            U256::zero(),
            Selector::of(tessera_staking::sig::STAKE),
            &input,
        )
        .unwrap();
        for _ in 0..2 {
            d.call(
                DEPLOYER,
                U256::zero(),
                Selector::of(tessera_staking::sig::ADVANCE_EPOCH),
                &[],
            )
            .unwrap();
        }
        d.call(
            ALICE,
            U256::zero(),
            Selector::of(tessera_staking::sig::CLAIM_REWARDS),
            &[],
        )
        .unwrap();
        assert_eq!(
            d.storage().token_balance(AppStorage::UTILITY_TOKEN, ALICE),
            U256::from(200)
        );

        // Swap the rewards: 200 utility * 5 / 50 = 20 gold.
        let input = encode_call(&tessera_exchange::SwapTokensArgs {
            token_in: AppStorage::UTILITY_TOKEN,
            token_out: gold,
            amount_in: U256::from(200),
        });
        let output = d
            .call(
                ALICE,
                U256::zero(),
                Selector::of(tessera_exchange::sig::SWAP_TOKENS),
                &input,
            )
            .unwrap();
        let out: U256 = decode_return(&output).unwrap();
        assert_eq!(out, U256::from(20));
        assert_eq!(d.storage().token_balance(gold, ALICE), U256::from(20));
    }

    // =============================================================================
    // ASYNC SERVICE SURFACE
    // =============================================================================

    #[tokio::test]
    async fn test_service_installs_and_dispatches_platform_calls() {
        let service = create_test_service();
        let deployer = service.config().deployer;

        service
            .with_dispatcher(|d| {
                d.register_code(ASSETS, Arc::new(AssetsFacet::new(ASSETS)));
            })
            .await;
        let contributed = service.install_module(deployer, ASSETS).await.unwrap();
        assert_eq!(contributed, AssetsFacet::selectors().len());

        let input = encode_call(&tessera_assets::CreateAssetArgs {
            name: "Depot 12".into(),
            supply: U256::from(10),
            price: U256::from(1),
        });
        let output = service
            .dispatch_call(
                deployer,
                U256::zero(),
                Selector::of(tessera_assets::sig::CREATE_ASSET),
                input,
            )
            .await
            .unwrap();
        let asset_id: u64 = decode_return(&output).unwrap();
        assert_eq!(asset_id, 1);

        // Reflection sees the installed facet next to the dispatcher.
        let addresses = service.facet_addresses().await;
        assert!(addresses.contains(&ASSETS));

        let stats = service.stats().await;
        assert_eq!(stats.modules_installed, 1);
        assert_eq!(stats.calls_dispatched, 2);
        assert_eq!(stats.failed_calls, 0);

        let events = service.events().await;
        assert!(events
            .iter()
            .any(|e| matches!(e, DiamondEvent::ModuleInstalled { target, .. } if *target == ASSETS)));
    }
}
