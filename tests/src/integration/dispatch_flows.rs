//! # Dispatch Integration Flows
//!
//! Cut protocol, routing, re-entrancy, and atomicity exercised through the
//! byte-level dispatch path, with purpose-built modules where the shipped
//! facets are too well-behaved to trigger the failure mode.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tessera_core::dispatch::{
        CallContext, DiamondCutArgs, Dispatcher, NativeOp, Runtime,
    };
    use tessera_core::errors::DiamondError;
    use tessera_core::module::ModuleCode;
    use tessera_types::codec::encode_call;
    use tessera_types::module::{FacetCut, ModuleError};
    use tessera_types::values::{Address, Bytes, Selector, U256};

    const DEPLOYER: Address = Address([0xde; 20]);

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(Address::new([0xd1; 20]), DEPLOYER)
    }

    // =============================================================================
    // TEST MODULES
    // =============================================================================

    /// Returns a fixed tag byte; two instances at different addresses stand
    /// in for two versions of the same operation.
    struct EchoModule {
        address: Address,
        selector: Selector,
        tag: u8,
    }

    impl ModuleCode for EchoModule {
        fn manifest(&self) -> Result<FacetCut, ModuleError> {
            Ok(FacetCut::add(self.address, vec![self.selector]))
        }

        fn call(
            &self,
            _rt: &mut Runtime<'_>,
            _ctx: &CallContext,
            selector: Selector,
            _input: &[u8],
        ) -> Result<Vec<u8>, ModuleError> {
            if selector != self.selector {
                return Err(ModuleError::UnknownSelector(selector));
            }
            Ok(vec![self.tag])
        }
    }

    /// A module whose guarded handler forwards into the guarded cut entry
    /// point, tripping the per-invocation latch.
    struct ReentrantModule {
        address: Address,
        selector: Selector,
    }

    impl ModuleCode for ReentrantModule {
        fn manifest(&self) -> Result<FacetCut, ModuleError> {
            Ok(FacetCut::add(self.address, vec![self.selector]))
        }

        fn call(
            &self,
            rt: &mut Runtime<'_>,
            _ctx: &CallContext,
            _selector: Selector,
            _input: &[u8],
        ) -> Result<Vec<u8>, ModuleError> {
            rt.guarded(|rt| {
                rt.storage.next_asset_id += 100;
                let input = encode_call(&DiamondCutArgs {
                    cuts: vec![FacetCut::remove(vec![Selector::of("anything()")])],
                    init_target: None,
                    init_data: Bytes::new(),
                });
                rt.forward(NativeOp::DiamondCut.selector(), &input)
            })
        }
    }

    /// Initializer target: its init operation writes the staking reward
    /// rate, making initializer execution observable.
    struct InitModule {
        address: Address,
    }

    impl InitModule {
        fn init_selector() -> Selector {
            Selector::of("initializeRewardRate(uint256)")
        }
    }

    impl ModuleCode for InitModule {
        fn manifest(&self) -> Result<FacetCut, ModuleError> {
            Ok(FacetCut::add(self.address, vec![Self::init_selector()]))
        }

        fn call(
            &self,
            rt: &mut Runtime<'_>,
            ctx: &CallContext,
            selector: Selector,
            _input: &[u8],
        ) -> Result<Vec<u8>, ModuleError> {
            if selector != Self::init_selector() {
                return Err(ModuleError::UnknownSelector(selector));
            }
            // Initializers run with the dispatcher as caller.
            if ctx.caller != rt.self_address() {
                return Err(ModuleError::Unauthorized(ctx.caller));
            }
            rt.storage.reward_rate = U256::from(7);
            Ok(Vec::new())
        }
    }

    // =============================================================================
    // CUT LIFECYCLE
    // =============================================================================

    #[test]
    fn test_add_replace_remove_lifecycle() {
        let mut d = dispatcher();
        let sel = Selector::of("version()");
        let v1 = Address::new([0x01; 20]);
        let v2 = Address::new([0x02; 20]);
        d.register_code(
            v1,
            Arc::new(EchoModule {
                address: v1,
                selector: sel,
                tag: 1,
            }),
        );
        d.register_code(
            v2,
            Arc::new(EchoModule {
                address: v2,
                selector: sel,
                tag: 2,
            }),
        );

        // ADD binds v1.
        d.diamond_cut(DEPLOYER, vec![FacetCut::add(v1, vec![sel])], None, Bytes::new())
            .unwrap();
        assert_eq!(d.call(DEPLOYER, U256::zero(), sel, &[]).unwrap(), vec![1]);

        // REPLACE rebinds to v2 without changing the directory size.
        let before = d.storage().selector_count();
        d.diamond_cut(
            DEPLOYER,
            vec![FacetCut::replace(v2, vec![sel])],
            None,
            Bytes::new(),
        )
        .unwrap();
        assert_eq!(d.storage().selector_count(), before);
        assert_eq!(d.call(DEPLOYER, U256::zero(), sel, &[]).unwrap(), vec![2]);
        assert_eq!(d.facet_address(sel), v2);

        // REMOVE unbinds; with no fallback the call now fails.
        d.diamond_cut(DEPLOYER, vec![FacetCut::remove(vec![sel])], None, Bytes::new())
            .unwrap();
        assert_eq!(d.storage().selector_count(), before - 1);
        assert_eq!(d.facet_address(sel), Address::ZERO);
        let err = d.call(DEPLOYER, U256::zero(), sel, &[]).unwrap_err();
        assert_eq!(err, DiamondError::ImplementationIsNotContract(Address::ZERO));
    }

    #[test]
    fn test_removed_selector_routes_to_fallback() {
        let mut d = dispatcher();
        let sel = Selector::of("version()");
        let module = Address::new([0x01; 20]);
        let fallback = Address::new([0xfb; 20]);
        d.register_code(
            module,
            Arc::new(EchoModule {
                address: module,
                selector: sel,
                tag: 1,
            }),
        );
        d.register_code(
            fallback,
            Arc::new(EchoModule {
                address: fallback,
                selector: sel,
                tag: 9,
            }),
        );
        d.diamond_cut(DEPLOYER, vec![FacetCut::add(module, vec![sel])], None, Bytes::new())
            .unwrap();
        d.set_fallback_address(DEPLOYER, fallback).unwrap();
        assert_eq!(d.call(DEPLOYER, U256::zero(), sel, &[]).unwrap(), vec![1]);

        // Once unbound, the same selector drains to the fallback target.
        d.diamond_cut(DEPLOYER, vec![FacetCut::remove(vec![sel])], None, Bytes::new())
            .unwrap();
        assert_eq!(d.call(DEPLOYER, U256::zero(), sel, &[]).unwrap(), vec![9]);
    }

    #[test]
    fn test_failing_batch_applies_nothing() {
        let mut d = dispatcher();
        let good = Selector::of("good()");
        let module = Address::new([0x01; 20]);
        d.register_code(
            module,
            Arc::new(EchoModule {
                address: module,
                selector: good,
                tag: 1,
            }),
        );

        let before = d.storage().selector_count();
        // Second cut fails: a native selector can never be re-added.
        let batch = vec![
            FacetCut::add(module, vec![good]),
            FacetCut::add(module, vec![NativeOp::DiamondCut.selector()]),
        ];
        let err = d
            .diamond_cut(DEPLOYER, batch, None, Bytes::new())
            .unwrap_err();
        assert_eq!(err, DiamondError::SelectorAlreadyAdded(NativeOp::DiamondCut.selector()));

        // The first cut of the batch was rolled back with the rest.
        assert_eq!(d.storage().selector_count(), before);
        assert_eq!(d.facet_address(good), Address::ZERO);
    }

    #[test]
    fn test_cut_requires_admin() {
        let mut d = dispatcher();
        let module = Address::new([0x01; 20]);
        d.register_code(
            module,
            Arc::new(EchoModule {
                address: module,
                selector: Selector::of("x()"),
                tag: 1,
            }),
        );
        let err = d
            .diamond_cut(
                Address::new([0x99; 20]),
                vec![FacetCut::add(module, vec![Selector::of("x()")])],
                None,
                Bytes::new(),
            )
            .unwrap_err();
        assert_eq!(err, DiamondError::Unauthorized(Address::new([0x99; 20])));
    }

    // =============================================================================
    // INITIALIZER
    // =============================================================================

    #[test]
    fn test_cut_initializer_runs_once_with_dispatcher_as_caller() {
        let mut d = dispatcher();
        let module = Address::new([0x11; 20]);
        d.register_code(module, Arc::new(InitModule { address: module }));

        let mut init_data = InitModule::init_selector().as_bytes().to_vec();
        init_data.extend(encode_call(&U256::from(7)));

        d.diamond_cut(
            DEPLOYER,
            vec![FacetCut::add(module, vec![InitModule::init_selector()])],
            Some(module),
            Bytes::from_vec(init_data),
        )
        .unwrap();

        assert_eq!(d.storage().reward_rate, U256::from(7));
    }

    #[test]
    fn test_initializer_pairing_is_enforced() {
        let mut d = dispatcher();
        let module = Address::new([0x11; 20]);
        d.register_code(module, Arc::new(InitModule { address: module }));
        let cut = FacetCut::add(module, vec![InitModule::init_selector()]);

        // Target without calldata.
        let err = d
            .diamond_cut(DEPLOYER, vec![cut.clone()], Some(module), Bytes::new())
            .unwrap_err();
        assert_eq!(err, DiamondError::InvalidInitializationParameters);

        // Calldata without target.
        let err = d
            .diamond_cut(DEPLOYER, vec![cut], None, Bytes::from_slice(&[1, 2, 3, 4]))
            .unwrap_err();
        assert_eq!(err, DiamondError::InvalidInitializationParameters);
    }

    #[test]
    fn test_failed_initializer_rolls_back_the_whole_cut() {
        let mut d = dispatcher();
        let module = Address::new([0x11; 20]);
        d.register_code(module, Arc::new(InitModule { address: module }));
        let sel = InitModule::init_selector();

        // Initializer data selects an operation the module rejects.
        let bad_data = Selector::of("unknownInit()").as_bytes().to_vec();
        let before = d.storage().selector_count();
        let err = d
            .diamond_cut(
                DEPLOYER,
                vec![FacetCut::add(module, vec![sel])],
                Some(module),
                Bytes::from_vec(bad_data),
            )
            .unwrap_err();
        assert!(matches!(err, DiamondError::Module(ModuleError::UnknownSelector(_))));

        // The ADD that preceded the initializer is gone too.
        assert_eq!(d.storage().selector_count(), before);
        assert_eq!(d.facet_address(sel), Address::ZERO);
    }

    // =============================================================================
    // RE-ENTRANCY
    // =============================================================================

    #[test]
    fn test_guarded_reentry_rolls_back_invocation() {
        let mut d = dispatcher();
        let module = Address::new([0x66; 20]);
        let sel = Selector::of("sneakyUpgrade()");
        d.register_code(
            module,
            Arc::new(ReentrantModule {
                address: module,
                selector: sel,
            }),
        );
        d.install_module(DEPLOYER, module).unwrap();

        let before = d.storage().next_asset_id;
        let err = d.call(DEPLOYER, U256::zero(), sel, &[]).unwrap_err();
        assert_eq!(err, DiamondError::ReentrantCall);
        // The write made before the re-entrant forward is discarded.
        assert_eq!(d.storage().next_asset_id, before);
    }

    // =============================================================================
    // REFLECTION ACROSS THE FULL PLATFORM
    // =============================================================================

    #[test]
    fn test_loupe_reports_every_installed_facet() {
        let mut d = dispatcher();
        let assets = Address::new([0xaa; 20]);
        let market = Address::new([0xab; 20]);
        let staking = Address::new([0xbb; 20]);
        d.register_code(assets, Arc::new(tessera_assets::AssetsFacet::new(assets)));
        d.register_code(market, Arc::new(tessera_market::MarketFacet::new(market)));
        d.register_code(staking, Arc::new(tessera_staking::StakingFacet::new(staking)));
        for module in [assets, market, staking] {
            d.install_module(DEPLOYER, module).unwrap();
        }

        let addresses = d.facet_addresses();
        assert_eq!(addresses.len(), 4);
        for module in [d.address(), assets, market, staking] {
            assert!(addresses.contains(&module));
        }

        let facets = d.facets().unwrap();
        let total: usize = facets.iter().map(|f| f.selectors.len()).sum();
        assert_eq!(total, d.storage().selector_count() as usize);

        assert_eq!(
            d.facet_function_selectors(assets).unwrap().len(),
            tessera_assets::AssetsFacet::selectors().len()
        );
    }
}
